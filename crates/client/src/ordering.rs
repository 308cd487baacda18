use std::cmp::Ordering;

use tracing::warn;

use crate::error::ApiError;
use crate::wire::{
    Page, PageId, PageType, PageUpdate, ReorderBatch, Resource, ResourceId, ResourceUpdate,
};

/// Server operations the ordering controller needs, kept behind a trait so
/// failure handling is testable without a network
#[allow(async_fn_in_trait)]
pub trait ResourceBackend {
    async fn list_resources(&self, page_id: PageId) -> Result<Vec<Resource>, ApiError>;
    async fn update_resource(
        &self,
        resource_id: ResourceId,
        update: &ResourceUpdate,
    ) -> Result<Resource, ApiError>;
    async fn reorder_resources(&self, batch: &ReorderBatch) -> Result<Vec<Resource>, ApiError>;
}

#[allow(async_fn_in_trait)]
pub trait PageBackend {
    async fn update_page(&self, page_id: PageId, update: &PageUpdate) -> Result<Page, ApiError>;
}

/// The in-memory ordered resource list of one page. Mutations apply
/// optimistically and either reconcile with server truth or roll back to
/// the captured pre-mutation state.
pub struct ResourceList<B> {
    page_id: PageId,
    backend: B,
    items: Vec<Resource>,
}

impl<B: ResourceBackend> ResourceList<B> {
    pub fn new(page_id: PageId, backend: B) -> Self {
        Self {
            page_id,
            backend,
            items: Vec::new(),
        }
    }

    pub fn with_items(page_id: PageId, backend: B, items: Vec<Resource>) -> Self {
        Self {
            page_id,
            backend,
            items,
        }
    }

    pub fn items(&self) -> &[Resource] {
        &self.items
    }

    fn index_of(&self, resource_id: ResourceId) -> Option<usize> {
        self.items.iter().position(|r| r.id == resource_id)
    }

    /// Replace local state wholesale with the server's list, never merge
    pub async fn refresh(&mut self) -> Result<(), ApiError> {
        self.items = self.backend.list_resources(self.page_id).await?;
        Ok(())
    }

    /// End of a drag gesture. Splice semantics: the dragged item leaves its
    /// source index and lands at the target index, everything between
    /// shifts by one. No-op when the drop target is missing or unknown.
    ///
    /// The move applies optimistically before the bulk update goes out. On
    /// success the canonical list is re-fetched, which also picks up edits
    /// from any concurrent actor; on failure the pre-drag order is
    /// restored.
    pub async fn on_drag_end(
        &mut self,
        active_id: ResourceId,
        over_id: Option<ResourceId>,
    ) -> Result<(), ApiError> {
        let Some(over_id) = over_id else {
            return Ok(());
        };
        if active_id == over_id {
            return Ok(());
        }
        let (Some(from), Some(to)) = (self.index_of(active_id), self.index_of(over_id)) else {
            return Ok(());
        };

        let snapshot = self.items.clone();
        let moved = self.items.remove(from);
        self.items.insert(to, moved);
        let batch: ReorderBatch = self
            .items
            .iter()
            .enumerate()
            .map(|(rank, resource)| (resource.id, rank as i32))
            .collect();

        if let Err(e) = self.backend.reorder_resources(&batch).await {
            warn!("reorder failed, restoring previous order: {e}");
            self.items = snapshot;
            return Err(e);
        }
        match self.backend.list_resources(self.page_id).await {
            Ok(canonical) => {
                self.items = canonical;
                Ok(())
            }
            Err(e) => {
                warn!("canonical refresh after reorder failed: {e}");
                Err(e)
            }
        }
    }

    /// Optimistic flip of the expansion flag, reverted if the update is
    /// rejected
    pub async fn toggle_expanded(&mut self, resource_id: ResourceId) -> Result<(), ApiError> {
        let Some(index) = self.index_of(resource_id) else {
            return Ok(());
        };
        let previous = self.items[index].is_expanded;
        self.items[index].is_expanded = !previous;
        let update = ResourceUpdate {
            is_expanded: Some(!previous),
            ..Default::default()
        };
        match self.backend.update_resource(resource_id, &update).await {
            Ok(updated) => {
                self.items[index] = updated;
                Ok(())
            }
            Err(e) => {
                self.items[index].is_expanded = previous;
                Err(e)
            }
        }
    }
}

/// Page collection with the favorite toggle, same optimistic pattern as
/// the resource list
pub struct PageList<B> {
    backend: B,
    items: Vec<Page>,
}

impl<B: PageBackend> PageList<B> {
    pub fn new(backend: B, items: Vec<Page>) -> Self {
        Self { backend, items }
    }

    pub fn items(&self) -> &[Page] {
        &self.items
    }

    pub fn sort_for_display(&mut self) {
        self.items.sort_by(display_ordering);
    }

    pub async fn toggle_favorite(&mut self, page_id: PageId) -> Result<(), ApiError> {
        let Some(index) = self.items.iter().position(|p| p.id == page_id) else {
            return Ok(());
        };
        let previous = self.items[index].is_favorite;
        self.items[index].is_favorite = !previous;
        let update = PageUpdate {
            is_favorite: Some(!previous),
            ..Default::default()
        };
        match self.backend.update_page(page_id, &update).await {
            Ok(updated) => {
                // single-field update, keep the nested resources we already hold
                self.items[index].is_favorite = updated.is_favorite;
                self.items[index].name = updated.name;
                self.items[index].page_type = updated.page_type;
                Ok(())
            }
            Err(e) => {
                self.items[index].is_favorite = previous;
                Err(e)
            }
        }
    }
}

/// Display order for the page overview: pages group by type; songs show
/// favorites first, then names; technical topics sort purely by name. The
/// name compare is case sensitive, as the original UI behaves.
pub fn display_ordering(a: &Page, b: &Page) -> Ordering {
    match a.page_type.cmp(&b.page_type) {
        Ordering::Equal => {}
        other => return other,
    }
    match a.page_type {
        PageType::Song => b
            .is_favorite
            .cmp(&a.is_favorite)
            .then_with(|| a.name.cmp(&b.name)),
        PageType::Technical => a.name.cmp(&b.name),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
    use std::sync::{Arc, Mutex};

    use chrono::Utc;

    use super::*;
    use crate::wire::ResourceType;

    fn resource(id: ResourceId, order: i32) -> Resource {
        Resource {
            id,
            page_id: 1,
            title: format!("resource {id}"),
            description: None,
            resource_type: ResourceType::Video,
            file_path: None,
            external_url: Some("https://example.com".to_string()),
            order,
            is_expanded: true,
            created_at: Utc::now(),
        }
    }

    fn page(id: PageId, name: &str, page_type: PageType, is_favorite: bool) -> Page {
        Page {
            id,
            name: name.to_string(),
            page_type,
            is_favorite,
            created_at: Utc::now(),
            resources: Vec::new(),
        }
    }

    #[derive(Clone, Default)]
    struct MockBackend {
        resources: Arc<Mutex<Vec<Resource>>>,
        pages: Arc<Mutex<Vec<Page>>>,
        fail_reorder: Arc<AtomicBool>,
        fail_update: Arc<AtomicBool>,
        reorder_batches: Arc<Mutex<Vec<ReorderBatch>>>,
    }

    impl MockBackend {
        fn with_resources(items: Vec<Resource>) -> Self {
            let mock = Self::default();
            *mock.resources.lock().unwrap() = items;
            mock
        }

        fn with_pages(items: Vec<Page>) -> Self {
            let mock = Self::default();
            *mock.pages.lock().unwrap() = items;
            mock
        }

        fn stored_orders(&self) -> Vec<(ResourceId, i32)> {
            let mut stored: Vec<(ResourceId, i32)> = self
                .resources
                .lock()
                .unwrap()
                .iter()
                .map(|r| (r.id, r.order))
                .collect();
            stored.sort_by_key(|(_, order)| *order);
            stored
        }
    }

    impl ResourceBackend for MockBackend {
        async fn list_resources(&self, _page_id: PageId) -> Result<Vec<Resource>, ApiError> {
            let mut items = self.resources.lock().unwrap().clone();
            items.sort_by_key(|r| r.order);
            Ok(items)
        }

        async fn update_resource(
            &self,
            resource_id: ResourceId,
            update: &ResourceUpdate,
        ) -> Result<Resource, ApiError> {
            if self.fail_update.load(AtomicOrdering::SeqCst) {
                return Err(ApiError::Transport("connection reset".to_string()));
            }
            let mut items = self.resources.lock().unwrap();
            let item = items
                .iter_mut()
                .find(|r| r.id == resource_id)
                .ok_or_else(|| ApiError::Api("not found".to_string()))?;
            if let Some(is_expanded) = update.is_expanded {
                item.is_expanded = is_expanded;
            }
            if let Some(order) = update.order {
                item.order = order;
            }
            Ok(item.clone())
        }

        async fn reorder_resources(&self, batch: &ReorderBatch) -> Result<Vec<Resource>, ApiError> {
            self.reorder_batches.lock().unwrap().push(batch.clone());
            if self.fail_reorder.load(AtomicOrdering::SeqCst) {
                return Err(ApiError::Transport("connection reset".to_string()));
            }
            let mut items = self.resources.lock().unwrap();
            for item in items.iter_mut() {
                if let Some(order) = batch.get(&item.id) {
                    item.order = *order;
                }
            }
            let mut applied = items.clone();
            applied.sort_by_key(|r| r.order);
            Ok(applied)
        }
    }

    impl PageBackend for MockBackend {
        async fn update_page(&self, page_id: PageId, update: &PageUpdate) -> Result<Page, ApiError> {
            if self.fail_update.load(AtomicOrdering::SeqCst) {
                return Err(ApiError::Transport("connection reset".to_string()));
            }
            let mut items = self.pages.lock().unwrap();
            let item = items
                .iter_mut()
                .find(|p| p.id == page_id)
                .ok_or_else(|| ApiError::Api("not found".to_string()))?;
            if let Some(is_favorite) = update.is_favorite {
                item.is_favorite = is_favorite;
            }
            Ok(item.clone())
        }
    }

    fn list_of(n: i64, backend: MockBackend) -> ResourceList<MockBackend> {
        let items: Vec<Resource> = (0..n).map(|i| resource(i + 1, i as i32)).collect();
        *backend.resources.lock().unwrap() = items.clone();
        ResourceList::with_items(1, backend, items)
    }

    fn ids(list: &ResourceList<MockBackend>) -> Vec<ResourceId> {
        list.items().iter().map(|r| r.id).collect()
    }

    #[tokio::test]
    async fn drag_moves_with_splice_semantics() {
        // forward move: intermediate items shift left
        let backend = MockBackend::default();
        let mut list = list_of(4, backend.clone());
        list.on_drag_end(1, Some(3)).await.unwrap();
        assert_eq!(ids(&list), vec![2, 3, 1, 4]);
        assert_eq!(backend.stored_orders(), vec![(2, 0), (3, 1), (1, 2), (4, 3)]);

        // backward move: intermediate items shift right
        let backend = MockBackend::default();
        let mut list = list_of(4, backend.clone());
        list.on_drag_end(4, Some(2)).await.unwrap();
        assert_eq!(ids(&list), vec![1, 4, 2, 3]);

        // adjacent swap
        let backend = MockBackend::default();
        let mut list = list_of(4, backend.clone());
        list.on_drag_end(2, Some(3)).await.unwrap();
        assert_eq!(ids(&list), vec![1, 3, 2, 4]);

        // to either boundary
        let backend = MockBackend::default();
        let mut list = list_of(4, backend.clone());
        list.on_drag_end(3, Some(1)).await.unwrap();
        assert_eq!(ids(&list), vec![3, 1, 2, 4]);
        let backend = MockBackend::default();
        let mut list = list_of(4, backend.clone());
        list.on_drag_end(1, Some(4)).await.unwrap();
        assert_eq!(ids(&list), vec![2, 3, 4, 1]);
    }

    #[tokio::test]
    async fn every_drag_pair_keeps_a_dense_permutation() {
        for from in 1..=5i64 {
            for to in 1..=5i64 {
                let backend = MockBackend::default();
                let mut list = list_of(5, backend.clone());
                list.on_drag_end(from, Some(to)).await.unwrap();

                // same id set, dense ranks, dragged item at the target index
                let mut seen = ids(&list);
                seen.sort_unstable();
                assert_eq!(seen, vec![1, 2, 3, 4, 5]);
                let orders: Vec<i32> = list.items().iter().map(|r| r.order).collect();
                assert_eq!(orders, vec![0, 1, 2, 3, 4]);
                if from != to {
                    assert_eq!(list.items()[(to - 1) as usize].id, from);
                    // everything else keeps its relative order
                    let others: Vec<ResourceId> =
                        ids(&list).into_iter().filter(|id| *id != from).collect();
                    let expected: Vec<ResourceId> =
                        (1..=5).filter(|id| *id != from).collect();
                    assert_eq!(others, expected);
                }
            }
        }
    }

    #[tokio::test]
    async fn dropping_nowhere_or_on_self_is_a_no_op() {
        let backend = MockBackend::default();
        let mut list = list_of(3, backend.clone());

        list.on_drag_end(2, None).await.unwrap();
        list.on_drag_end(2, Some(2)).await.unwrap();
        list.on_drag_end(99, Some(1)).await.unwrap();
        list.on_drag_end(1, Some(99)).await.unwrap();

        assert_eq!(ids(&list), vec![1, 2, 3]);
        assert!(backend.reorder_batches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_reorder_rolls_back_to_pre_drag_order() {
        let backend = MockBackend::default();
        let mut list = list_of(4, backend.clone());
        backend.fail_reorder.store(true, AtomicOrdering::SeqCst);

        let result = list.on_drag_end(1, Some(4)).await;
        assert!(result.is_err());
        assert_eq!(ids(&list), vec![1, 2, 3, 4]);
        // the request did go out once, no retry
        assert_eq!(backend.reorder_batches.lock().unwrap().len(), 1);
        // server state untouched
        assert_eq!(backend.stored_orders(), vec![(1, 0), (2, 1), (3, 2), (4, 3)]);
    }

    #[tokio::test]
    async fn successful_reorder_adopts_server_truth_wholesale() {
        let backend = MockBackend::default();
        let mut list = list_of(3, backend.clone());

        // a concurrent actor slipped in a new resource the local list
        // doesn't know about yet
        backend.resources.lock().unwrap().push(resource(9, 3));

        list.on_drag_end(1, Some(2)).await.unwrap();
        assert_eq!(ids(&list), vec![2, 1, 3, 9]);
    }

    #[tokio::test]
    async fn expand_toggle_rolls_back_on_failure() {
        let backend = MockBackend::default();
        let mut list = list_of(2, backend.clone());
        assert!(list.items()[0].is_expanded);

        list.toggle_expanded(1).await.unwrap();
        assert!(!list.items()[0].is_expanded);
        assert!(!backend.resources.lock().unwrap()[0].is_expanded);

        backend.fail_update.store(true, AtomicOrdering::SeqCst);
        let result = list.toggle_expanded(1).await;
        assert!(result.is_err());
        // still collapsed, the flip was reverted
        assert!(!list.items()[0].is_expanded);
    }

    #[tokio::test]
    async fn favorite_toggle_rolls_back_on_failure() {
        let backend = MockBackend::with_pages(vec![
            page(1, "Wonderwall", PageType::Song, false),
            page(2, "Creep", PageType::Song, true),
        ]);
        let mut pages = PageList::new(backend.clone(), backend.pages.lock().unwrap().clone());

        pages.toggle_favorite(1).await.unwrap();
        assert!(pages.items()[0].is_favorite);

        backend.fail_update.store(true, AtomicOrdering::SeqCst);
        let result = pages.toggle_favorite(2).await;
        assert!(result.is_err());
        assert!(pages.items()[1].is_favorite);
    }

    #[test]
    fn display_comparator_groups_and_favors() {
        let mut pages = PageList::new(
            MockBackend::default(),
            vec![
                page(1, "Zombie", PageType::Song, false),
                page(2, "Rust ownership", PageType::Technical, false),
                page(3, "Angie", PageType::Song, false),
                page(4, "Wonderwall", PageType::Song, true),
                page(5, "Borrow checker", PageType::Technical, true),
            ],
        );
        pages.sort_for_display();
        let names: Vec<&str> = pages.items().iter().map(|p| p.name.as_str()).collect();
        // songs first: favorites, then alphabetic; technical purely
        // alphabetic regardless of favorite
        assert_eq!(
            names,
            vec![
                "Wonderwall",
                "Angie",
                "Zombie",
                "Borrow checker",
                "Rust ownership"
            ]
        );
    }

    #[test]
    fn name_compare_is_case_sensitive() {
        let a = page(1, "abba", PageType::Song, false);
        let b = page(2, "Beatles", PageType::Song, false);
        // uppercase sorts before lowercase in a case-sensitive compare
        assert_eq!(display_ordering(&a, &b), std::cmp::Ordering::Greater);
    }

    #[tokio::test]
    async fn refresh_replaces_local_state() {
        let backend = MockBackend::with_resources(vec![resource(7, 0), resource(8, 1)]);
        let mut list = ResourceList::new(1, backend);
        assert!(list.items().is_empty());
        list.refresh().await.unwrap();
        assert_eq!(ids(&list), vec![7, 8]);
    }
}
