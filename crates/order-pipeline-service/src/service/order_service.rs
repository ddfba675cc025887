//! 订单维护服务
//!
//! 订单删除默认是软删除，结算重算会自动排除已删除订单；
//! 物理清除只能作用于已软删除的订单。

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::{PipelineError, Result};
use crate::models::CanonicalOrder;
use crate::repository::OrderRepositoryTrait;

/// 订单维护服务
pub struct OrderService {
    orders: Arc<dyn OrderRepositoryTrait>,
}

impl OrderService {
    pub fn new(orders: Arc<dyn OrderRepositoryTrait>) -> Self {
        Self { orders }
    }

    pub async fn get_order(&self, id: Uuid) -> Result<CanonicalOrder> {
        self.orders
            .get_order(id)
            .await?
            .ok_or(PipelineError::OrderNotFound(id))
    }

    /// 软删除订单
    #[instrument(skip_all, fields(order_id = %id, actor_id = %actor_id))]
    pub async fn soft_delete(&self, id: Uuid, actor_id: &str) -> Result<CanonicalOrder> {
        if actor_id.trim().is_empty() {
            return Err(PipelineError::Validation("删除操作人不能为空".to_string()));
        }

        let order = self.get_order(id).await?;
        if order.is_deleted {
            return Ok(order);
        }

        let order = self
            .orders
            .set_deleted(id, true, Some(actor_id), Utc::now())
            .await?
            .ok_or(PipelineError::OrderNotFound(id))?;

        info!(
            organization_id = %order.organization_id,
            actor_id,
            "订单已软删除，相关结算需重新计算"
        );
        Ok(order)
    }

    /// 恢复软删除的订单
    #[instrument(skip_all, fields(order_id = %id, actor_id = %actor_id))]
    pub async fn restore(&self, id: Uuid, actor_id: &str) -> Result<CanonicalOrder> {
        let order = self
            .orders
            .set_deleted(id, false, None, Utc::now())
            .await?
            .ok_or(PipelineError::OrderNotFound(id))?;

        info!(organization_id = %order.organization_id, actor_id, "订单已恢复");
        Ok(order)
    }

    /// 物理清除订单（管理员操作）
    #[instrument(skip_all, fields(order_id = %id, actor_id = %actor_id))]
    pub async fn purge(&self, id: Uuid, actor_id: &str) -> Result<()> {
        let order = self.get_order(id).await?;
        if !order.is_deleted {
            return Err(PipelineError::Validation(format!(
                "订单 {} 未软删除，不能清除",
                id
            )));
        }

        if !self.orders.purge_order(id).await? {
            return Err(PipelineError::OrderNotFound(id));
        }

        warn!(
            organization_id = %order.organization_id,
            actor_id,
            deleted_by = ?order.deleted_by,
            "订单已被物理清除"
        );
        Ok(())
    }
}
