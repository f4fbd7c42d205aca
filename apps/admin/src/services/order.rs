//! # Order Service
//!
//! Order lookup for the back office and status changes along the
//! fulfilment path (`just_placed → pending → en_route → delivered`, or
//! `cancelled`).

use chrono::Utc;
use serde::Serialize;
use tracing::info;

use bookstore_core::{Filter, Money, Order, OrderDetail, OrderStatus};

use crate::error::{AdminError, AdminResult};
use crate::state::Repositories;

/// An order with its lines and their total.
#[derive(Debug, Clone, Serialize)]
pub struct OrderSummary {
    pub order: Order,
    pub details: Vec<OrderDetail>,
    pub total: Money,
}

pub struct OrderService {
    repos: Repositories,
}

impl OrderService {
    pub fn new(repos: Repositories) -> Self {
        OrderService { repos }
    }

    /// Orders in insertion order, optionally only those in `status`.
    pub async fn list_orders(&self, status: Option<OrderStatus>) -> AdminResult<Vec<Order>> {
        let filter = status.map_or(Filter::All, |s| Filter::eq("status", s));
        Ok(self.repos.orders.list(filter).await?)
    }

    pub async fn get_order(&self, id: &str) -> AdminResult<OrderSummary> {
        let order = self
            .repos
            .orders
            .find(id)
            .await?
            .ok_or_else(|| AdminError::not_found("Order", id))?;

        let details = self
            .repos
            .order_details
            .list(Filter::eq("order_id", id))
            .await?;
        let total = details.iter().map(OrderDetail::line_total).sum();

        Ok(OrderSummary {
            order,
            details,
            total,
        })
    }

    pub async fn update_status(&self, id: &str, status: OrderStatus) -> AdminResult<Order> {
        let mut order = self
            .repos
            .orders
            .find(id)
            .await?
            .ok_or_else(|| AdminError::not_found("Order", id))?;

        let from = order.status;
        order.status = status;
        order.updated_at = Utc::now();

        self.repos.orders.update(order.clone()).await?;
        self.repos.orders.save().await?;

        info!(order_id = %id, from = from.as_str(), to = status.as_str(), "Order status changed");
        Ok(order)
    }
}
