//! 批次规划 - 业务能力层
//!
//! 纯函数：由页面、分组、自定义顺序、模式和每批页数决定批次计划，无 I/O。
//!
//! 优先级（高者生效）：
//! 1. 自定义顺序：原样使用，过滤掉未启用的页，过滤后为空的批次丢弃
//! 2. 分组：每组一批，未分组的启用页各自一批，按批内最小页码升序
//! 3. `FixedN`：按页码顺序每 `chunk_size` 页一批，最后一批可以更短
//! 4. `Single`：每个启用页一批
//!
//! 无论哪条规则，结果都恰好覆盖所有启用页各一次。

use std::collections::{BTreeMap, HashSet};

use crate::models::{Batch, BatchKind, BatchPlan, Group, OrderEntry, Page, PlanMode};

/// 生成批次计划
///
/// 启用页为空时返回空计划，调用方应视为"无事可做"而非错误。
pub fn plan(
    pages: &[Page],
    groups: &[Group],
    custom_order: Option<&[OrderEntry]>,
    mode: PlanMode,
    chunk_size: usize,
) -> BatchPlan {
    let enabled = EnabledPages::new(pages);
    if enabled.is_empty() {
        return BatchPlan::default();
    }

    let batches = if let Some(order) = custom_order {
        plan_custom_order(&enabled, order)
    } else if !groups.is_empty() {
        plan_groups(&enabled, groups)
    } else if mode == PlanMode::FixedN {
        plan_chunks(&enabled, chunk_size.max(1))
    } else {
        plan_singles(&enabled)
    };

    BatchPlan::new(batches)
}

/// 启用页索引（按页码有序）
struct EnabledPages<'a> {
    by_index: BTreeMap<usize, &'a Page>,
}

impl<'a> EnabledPages<'a> {
    fn new(pages: &'a [Page]) -> Self {
        Self {
            by_index: pages
                .iter()
                .filter(|p| p.enabled)
                .map(|p| (p.index, p))
                .collect(),
        }
    }

    fn is_empty(&self) -> bool {
        self.by_index.is_empty()
    }

    fn contains(&self, index: usize) -> bool {
        self.by_index.contains_key(&index)
    }

    fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.by_index.keys().copied()
    }

    /// 按给定页码构造批次；调用方保证页码均已启用
    fn batch(&self, kind: BatchKind, members: Vec<usize>) -> Batch {
        let images = members
            .iter()
            .filter_map(|i| self.by_index.get(i).map(|p| p.image.clone()))
            .collect();
        Batch {
            kind,
            pages: members,
            images,
        }
    }
}

/// 保留启用且尚未出现过的页，保持原有顺序
fn claim_members(
    enabled: &EnabledPages<'_>,
    members: &[usize],
    used: &mut HashSet<usize>,
) -> Vec<usize> {
    members
        .iter()
        .copied()
        .filter(|i| enabled.contains(*i) && used.insert(*i))
        .collect()
}

fn plan_custom_order(enabled: &EnabledPages<'_>, order: &[OrderEntry]) -> Vec<Batch> {
    let mut used = HashSet::new();
    let mut batches: Vec<Batch> = order
        .iter()
        .filter_map(|entry| {
            let members = claim_members(enabled, entry.members(), &mut used);
            (!members.is_empty()).then(|| enabled.batch(entry.kind(), members))
        })
        .collect();

    // 自定义顺序中遗漏的启用页追加在末尾，保证不丢页
    let missing: Vec<usize> = enabled.indices().filter(|i| !used.contains(i)).collect();
    batches.extend(
        missing
            .into_iter()
            .map(|i| enabled.batch(BatchKind::Page, vec![i])),
    );
    batches
}

fn plan_groups(enabled: &EnabledPages<'_>, groups: &[Group]) -> Vec<Batch> {
    let mut used = HashSet::new();
    let mut ordered: Vec<(usize, Batch)> = Vec::new();

    for group in groups {
        let members = claim_members(enabled, &group.pages, &mut used);
        if let Some(min_page) = members.iter().copied().min() {
            ordered.push((min_page, enabled.batch(BatchKind::Group, members)));
        }
    }

    for index in enabled.indices() {
        if !used.contains(&index) {
            ordered.push((index, enabled.batch(BatchKind::Page, vec![index])));
        }
    }

    // 各批次的最小页码互不相同，稳定排序即可确定顺序
    ordered.sort_by_key(|(min_page, _)| *min_page);
    ordered.into_iter().map(|(_, batch)| batch).collect()
}

fn plan_chunks(enabled: &EnabledPages<'_>, chunk_size: usize) -> Vec<Batch> {
    let indices: Vec<usize> = enabled.indices().collect();
    indices
        .chunks(chunk_size)
        .map(|chunk| enabled.batch(BatchKind::Chunk, chunk.to_vec()))
        .collect()
}

fn plan_singles(enabled: &EnabledPages<'_>) -> Vec<Batch> {
    enabled
        .indices()
        .map(|i| enabled.batch(BatchKind::Page, vec![i]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn pages(count: usize, disabled: &[usize]) -> Vec<Page> {
        (0..count)
            .map(|index| Page {
                index,
                image: PathBuf::from(format!("page_{:03}.png", index + 1)),
                enabled: !disabled.contains(&index),
            })
            .collect()
    }

    /// 每个启用页恰好出现一次，未启用页不出现
    fn assert_partition(plan: &BatchPlan, pages: &[Page]) {
        let mut seen: Vec<usize> = plan.iter().flat_map(|b| b.pages.clone()).collect();
        seen.sort_unstable();
        let expected: Vec<usize> = pages.iter().filter(|p| p.enabled).map(|p| p.index).collect();
        assert_eq!(seen, expected);
        for batch in plan.iter() {
            assert!(!batch.is_empty());
            assert_eq!(batch.pages.len(), batch.images.len());
        }
    }

    #[test]
    fn test_single_mode_one_batch_per_enabled_page() {
        let pages = pages(4, &[2]);
        let plan = plan(&pages, &[], None, PlanMode::Single, 3);
        assert_eq!(plan.page_lists(), vec![vec![0], vec![1], vec![3]]);
        assert_partition(&plan, &pages);
    }

    #[test]
    fn test_fixed_n_last_chunk_shorter() {
        let pages = pages(7, &[1]);
        let plan = plan(&pages, &[], None, PlanMode::FixedN, 4);
        assert_eq!(plan.page_lists(), vec![vec![0, 2, 3, 4], vec![5, 6]]);
        assert!(plan.iter().all(|b| b.kind == BatchKind::Chunk));
        assert_partition(&plan, &pages);
    }

    #[test]
    fn test_fixed_n_zero_chunk_size_behaves_as_one() {
        let pages = pages(2, &[]);
        let plan = plan(&pages, &[], None, PlanMode::FixedN, 0);
        assert_eq!(plan.page_lists(), vec![vec![0], vec![1]]);
    }

    #[test]
    fn test_groups_ordered_by_min_page() {
        let pages = pages(6, &[]);
        let groups = vec![Group::new(vec![4, 2]), Group::new(vec![5, 0])];
        let plan = plan(&pages, &groups, None, PlanMode::FixedN, 2);
        assert_eq!(plan.page_lists(), vec![vec![5, 0], vec![1], vec![4, 2], vec![3]]);
        assert_partition(&plan, &pages);
    }

    #[test]
    fn test_group_filtered_to_enabled_pages() {
        let pages = pages(4, &[1, 3]);
        let groups = vec![Group::new(vec![1, 3])];
        let plan = plan(&pages, &groups, None, PlanMode::Single, 1);
        // 分组全部被禁用，整组消失
        assert_eq!(plan.page_lists(), vec![vec![0], vec![2]]);
        assert_partition(&plan, &pages);
    }

    #[test]
    fn test_overlapping_groups_do_not_duplicate_pages() {
        let pages = pages(4, &[]);
        let groups = vec![Group::new(vec![0, 1]), Group::new(vec![1, 2])];
        let plan = plan(&pages, &groups, None, PlanMode::Single, 1);
        assert_eq!(plan.page_lists(), vec![vec![0, 1], vec![2], vec![3]]);
        assert_partition(&plan, &pages);
    }

    #[test]
    fn test_custom_order_wins_over_group_tie_break() {
        let pages = pages(3, &[]);
        let groups = vec![Group::new(vec![0, 2])];
        let order = vec![OrderEntry::Page(vec![1]), OrderEntry::Group(vec![0, 2])];
        let plan = plan(&pages, &groups, Some(&order), PlanMode::Single, 1);
        assert_eq!(plan.page_lists(), vec![vec![1], vec![0, 2]]);
        assert_eq!(plan.get(1).map(|b| b.kind), Some(BatchKind::Group));
    }

    #[test]
    fn test_custom_order_drops_emptied_batches_and_appends_missing() {
        let pages = pages(5, &[1]);
        let order = vec![
            OrderEntry::Page(vec![1]),
            OrderEntry::Group(vec![3, 0]),
            OrderEntry::Page(vec![0]),
        ];
        let plan = plan(&pages, &[], Some(&order), PlanMode::Single, 1);
        assert_eq!(plan.page_lists(), vec![vec![3, 0], vec![2], vec![4]]);
        assert_partition(&plan, &pages);
    }

    #[test]
    fn test_no_enabled_pages_is_empty_plan() {
        let pages = pages(3, &[0, 1, 2]);
        let groups = vec![Group::new(vec![0, 1])];
        assert!(plan(&pages, &groups, None, PlanMode::Single, 1).is_empty());
        assert!(plan(&[], &[], None, PlanMode::FixedN, 3).is_empty());
    }

    #[test]
    fn test_plan_is_deterministic() {
        let pages = pages(12, &[3, 7]);
        let groups = vec![
            Group::new(vec![9, 10, 11]),
            Group::new(vec![1, 5]),
            Group::new(vec![7, 8]),
        ];
        let first = plan(&pages, &groups, None, PlanMode::FixedN, 4);
        let second = plan(&pages, &groups, None, PlanMode::FixedN, 4);
        assert_eq!(first, second);
        assert_partition(&first, &pages);
    }

    #[test]
    fn test_partition_holds_across_modes_and_groupings() {
        // 穷举小规模的启用状态组合
        for mask in 0u32..(1 << 6) {
            let disabled: Vec<usize> = (0..6).filter(|i| mask & (1 << i) != 0).collect();
            let pages = pages(6, &disabled);
            let groupings = [
                vec![],
                vec![Group::new(vec![0, 5])],
                vec![Group::new(vec![1, 2, 3]), Group::new(vec![4, 0])],
            ];
            for groups in &groupings {
                for mode in [PlanMode::Single, PlanMode::FixedN, PlanMode::Custom] {
                    for chunk in [1, 2, 4] {
                        let plan = plan(&pages, groups, None, mode, chunk);
                        assert_partition(&plan, &pages);
                    }
                }
            }
        }
    }
}
