//! 单个文档处理器
//!
//! 负责一个文档的批次循环：渲染 → 生成批次计划 → 逐批提交

use tracing::{debug, error, info, warn};

use crate::models::BatchPlan;
use crate::orchestrator::queue_runner::{ActivePlan, Orchestrator};
use crate::workflow::events::progress_percent;
use crate::workflow::{BatchCtx, ControlInbox, Halt, Outcome, WorkerEvent};

impl Orchestrator {
    /// 从断点处理一个文档
    ///
    /// 返回 `Ok` 表示该文档已结束（完成或被跳过），断点由调用方推进到下一文档。
    pub(super) async fn process_document(
        &mut self,
        document_index: usize,
        documents: usize,
        inbox: &mut ControlInbox,
    ) -> Result<(), Halt> {
        let Some(name) = self.ensure_rasterized(document_index).await else {
            return Ok(());
        };

        let Some(plan) = self.plan_for(document_index).await else {
            return Ok(());
        };
        if plan.is_empty() {
            warn!("[文档 {}] ⚠️ {} 没有启用的页面，跳过", document_index + 1, name);
            self.skip_document(document_index, &name, "没有启用的页面");
            return Ok(());
        }

        self.checkpoint.clamp_batch(plan.len());
        log_document_start(document_index, &name, &plan, self.checkpoint.batch_index);
        self.events.emit(WorkerEvent::DocumentStarted {
            document: document_index,
            name: name.clone(),
            batches: plan.len(),
        });
        if self.checkpoint.batch_index == 0 {
            if let Some(transcript) = &self.transcript {
                if let Err(e) = transcript.write_document_header(&name) {
                    warn!("[文档 {}] 写入记录失败: {}", document_index + 1, e);
                }
            }
        }

        let mut conversation_renewed = false;

        while self.checkpoint.batch_index < plan.len() {
            let batch_index = self.checkpoint.batch_index;
            if let Some(halt) = inbox.check() {
                return Err(halt);
            }

            let Some(planned) = plan.get(batch_index) else {
                break;
            };
            let mut batch = planned.clone();
            let ctx = BatchCtx::new(
                document_index,
                &name,
                batch_index,
                plan.len(),
                batch.to_string(),
            );

            if batch_index == 0
                && document_index > 0
                && self.options.new_conversation_per_document
                && !conversation_renewed
            {
                self.start_new_conversation(&ctx.to_string()).await;
                conversation_renewed = true;
            }

            // 运行期间可能有页面被禁用
            if let Some(document) = self.queue.read().await.get(document_index) {
                batch.retain_pages(|page| document.is_page_enabled(page));
            }
            if batch.is_empty() {
                info!("{} 批次中的页面已全部禁用，跳过", ctx);
                self.stats.batches_skipped += 1;
                self.checkpoint.advance_batch();
                self.events
                    .emit(WorkerEvent::CheckpointSaved(self.checkpoint.clone()));
                continue;
            }

            self.events.emit(WorkerEvent::BatchStarted {
                document: document_index,
                batch: batch_index,
                total: plan.len(),
                pages: batch.pages.clone(),
            });

            let execution = self
                .engine
                .execute(
                    self.driver.as_mut(),
                    &batch.images,
                    &self.options.prompt,
                    &ctx,
                    inbox,
                    &self.events,
                )
                .await;

            match execution.outcome {
                Outcome::Success(reply) => {
                    if let Some(transcript) = &self.transcript {
                        if let Err(e) = transcript.write_reply(&name, &ctx.label, &reply) {
                            warn!("{} 写入记录失败: {}", ctx, e);
                        }
                    }
                    self.events.emit(WorkerEvent::BatchSucceeded {
                        document: document_index,
                        batch: batch_index,
                        reply,
                    });
                    self.stats.batches_succeeded += 1;
                    self.checkpoint.record_pages(batch.len());
                    self.checkpoint.advance_batch();

                    let is_final_batch =
                        document_index + 1 >= documents && batch_index + 1 >= plan.len();
                    if let Some(threshold) = self.options.new_conversation_page_threshold {
                        if self.checkpoint.pages_since_new_conversation >= threshold
                            && !is_final_batch
                        {
                            info!(
                                "{} 已发送 {} 页，达到阈值 {}",
                                ctx, self.checkpoint.pages_since_new_conversation, threshold
                            );
                            self.start_new_conversation(&ctx.to_string()).await;
                        }
                    }
                }
                Outcome::ExhaustedRetries => {
                    error!(
                        "{} ❌ {} 在 {} 次尝试后仍失败，已跳过",
                        ctx, ctx.label, execution.attempts
                    );
                    if let Some(transcript) = &self.transcript {
                        if let Err(e) =
                            transcript.write_failure(&name, &ctx.label, execution.attempts)
                        {
                            warn!("{} 写入记录失败: {}", ctx, e);
                        }
                    }
                    self.events.emit(WorkerEvent::BatchFailed {
                        document: document_index,
                        batch: batch_index,
                        attempts: execution.attempts,
                    });
                    self.stats.batches_failed += 1;
                    self.checkpoint.advance_batch();
                }
                Outcome::RateLimited(reason) => {
                    if !self.options.auto_pause {
                        warn!("{} ⏸️ 平台限流且未开启自动暂停，停止处理: {}", ctx, reason);
                        return Err(Halt::Stop);
                    }
                    self.pause_for_rate_limit(&reason, inbox).await?;
                    continue;
                }
                Outcome::Halted(halt) => return Err(halt),
            }

            self.events
                .emit(WorkerEvent::CheckpointSaved(self.checkpoint.clone()));
            self.events.emit(WorkerEvent::Progress(progress_percent(
                document_index,
                documents,
                batch_index,
                plan.len(),
            )));

            let has_next = self.checkpoint.batch_index < plan.len();
            if has_next && !self.options.batch_delay.is_zero() {
                if let Some(halt) = inbox.sleep(self.options.batch_delay).await {
                    return Err(halt);
                }
            }
        }

        info!("[文档 {}] ✓ {} 处理完成", document_index + 1, name);
        Ok(())
    }

    /// 文档的批次计划
    ///
    /// 已有批次发出后沿用开始时的计划，之后禁用的页面由发送前的过滤剔除；
    /// 尚未发出任何批次时按当前页面状态重新生成。
    async fn plan_for(&mut self, document_index: usize) -> Option<BatchPlan> {
        let queue = self.queue.read().await;
        let document = queue.get(document_index)?;

        if self.checkpoint.batch_index > 0 {
            let cached = self
                .active_plan
                .as_ref()
                .filter(|active| {
                    active.document_index == document_index && active.path == document.path
                });
            if let Some(active) = cached {
                debug!("[文档 {}] 沿用已开始的批次计划", document_index + 1);
                return Some(active.plan.clone());
            }
        }

        let plan = document.plan();
        self.active_plan = Some(ActivePlan {
            document_index,
            path: document.path.clone(),
            plan: plan.clone(),
        });
        Some(plan)
    }

    /// 确保文档已渲染；转换失败时跳过该文档并返回 None
    ///
    /// 渲染期间不持有队列锁。
    async fn ensure_rasterized(&mut self, document_index: usize) -> Option<String> {
        let (path, name, cached) = {
            let queue = self.queue.read().await;
            let document = queue.get(document_index)?;
            (document.path.clone(), document.name(), document.is_rasterized())
        };
        if cached {
            return Some(name);
        }

        info!("[文档 {}] 🖼️ 正在转换 {}", document_index + 1, name);
        match self.rasterizer.rasterize(&path, self.options.pdf_dpi).await {
            Ok(images) => {
                info!("[文档 {}] ✓ 转换完成，共 {} 页", document_index + 1, images.len());
                let mut queue = self.queue.write().await;
                if let Some(document) = queue.get_mut(document_index) {
                    if document.path == path {
                        document.set_rasterized_pages(images);
                    }
                }
                Some(name)
            }
            Err(e) => {
                error!("[文档 {}] ❌ 转换失败，跳过: {}", document_index + 1, e);
                self.skip_document(document_index, &name, &e.to_string());
                None
            }
        }
    }

    fn skip_document(&mut self, document_index: usize, name: &str, reason: &str) {
        self.stats.documents_skipped += 1;
        self.events.emit(WorkerEvent::DocumentSkipped {
            document: document_index,
            name: name.to_string(),
            reason: reason.to_string(),
        });
    }
}

fn log_document_start(document_index: usize, name: &str, plan: &BatchPlan, from_batch: usize) {
    info!("\n{}", "─".repeat(60));
    info!("[文档 {}] 📄 {}", document_index + 1, name);
    if from_batch > 0 {
        info!(
            "[文档 {}] 共 {} 个批次 {} 页，从第 {} 批继续",
            document_index + 1,
            plan.len(),
            plan.total_pages(),
            from_batch + 1
        );
    } else {
        info!(
            "[文档 {}] 共 {} 个批次 {} 页",
            document_index + 1,
            plan.len(),
            plan.total_pages()
        );
    }
    info!("{}", "─".repeat(60));
}
