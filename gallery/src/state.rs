//! Gallery list state and the reducer that drives it.
//!
//! All list mutations go through [`GalleryState::update`]. List-level actions
//! (refresh, filter, sort, load more) return a [`Transition::Fetch`] carrying
//! a request generation; the response is fed back as [`Action::PageLoaded`] or
//! [`Action::PageFailed`] and is dropped if a newer list request was issued in
//! the meantime.

use api_client::{
    Category, Column, Filter, MediaItem, Order, RowPage, RowQuery, ALL_CATEGORIES,
};
use std::fmt;
use std::str::FromStr;

/// Number of items per page.
pub const PAGE_SIZE: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Newest,
    MostLiked,
    MostDownloaded,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Newest => "newest",
            SortOrder::MostLiked => "most_liked",
            SortOrder::MostDownloaded => "most_downloaded",
        }
    }

    fn column(&self) -> Column {
        match self {
            SortOrder::Newest => Column::CreatedAt,
            SortOrder::MostLiked => Column::Likes,
            SortOrder::MostDownloaded => Column::Downloads,
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "newest" => Ok(SortOrder::Newest),
            "most_liked" => Ok(SortOrder::MostLiked),
            "most_downloaded" => Ok(SortOrder::MostDownloaded),
            other => Err(format!("unknown sort option: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(Category),
}

impl FromStr for CategoryFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == ALL_CATEGORIES {
            Ok(CategoryFilter::All)
        } else {
            s.parse().map(CategoryFilter::Only)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Filters {
    pub search: Option<String>,
    pub category: CategoryFilter,
}

impl Filters {
    /// The search string with surrounding whitespace removed, if anything is left.
    pub fn search_text(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Query for page `page` (1-based) of the list selected by `filters` and `sort`.
///
/// A search matches the whole text against title or uploader, or any single
/// whitespace-separated token exactly against the tags.
pub fn build_query(filters: &Filters, sort: SortOrder, page: u32) -> RowQuery {
    let offset = (page.saturating_sub(1) as usize) * PAGE_SIZE;
    let mut query = RowQuery::new(offset, PAGE_SIZE);

    if let Some(text) = filters.search_text() {
        let mut any = vec![
            Filter::ILike(Column::Title, text.to_string()),
            Filter::ILike(Column::Uploader, text.to_string()),
        ];
        any.extend(
            text.split_whitespace()
                .map(|token| Filter::Contains(Column::Tags, vec![token.to_string()])),
        );
        query = query.filter(Filter::Or(any));
    }
    if let CategoryFilter::Only(category) = &filters.category {
        query = query.filter(Filter::Eq(Column::Category, category.to_string()));
    }

    query
        .order_by(Order::desc(sort.column()))
        .order_by(Order::desc(Column::Id))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    Idle,
    Loading {
        page: u32,
    },
    Loaded,
}

/// A list fetch the caller must run and report back.
#[derive(Debug, Clone, PartialEq)]
pub struct PageRequest {
    pub generation: u64,
    pub page: u32,
    pub query: RowQuery,
}

#[derive(Debug, Clone)]
pub enum Action {
    /// Reload page 1 for the current filters and sort.
    Refresh,
    SetFilters(Filters),
    SetSort(SortOrder),
    LoadMore,
    PageLoaded {
        generation: u64,
        page: u32,
        result: RowPage,
    },
    PageFailed {
        generation: u64,
    },
    Prepend(MediaItem),
    Replace(MediaItem),
    Remove(String),
    AdjustDownloads {
        id: String,
        delta: i64,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Fetch(PageRequest),
    Loaded { added: usize, has_more: bool },
    Changed,
    Unchanged,
    /// A response for a superseded list request.
    Stale,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GalleryState {
    pub filters: Filters,
    pub sort: SortOrder,
    /// Last page successfully loaded for the current generation; 0 if none.
    pub page: u32,
    pub items: Vec<MediaItem>,
    pub has_more: bool,
    pub status: Status,
    pub generation: u64,
}

impl Default for GalleryState {
    fn default() -> Self {
        GalleryState {
            filters: Filters::default(),
            sort: SortOrder::default(),
            page: 0,
            items: Vec::new(),
            has_more: true,
            status: Status::Idle,
            generation: 0,
        }
    }
}

impl GalleryState {
    pub fn is_loading(&self) -> bool {
        matches!(self.status, Status::Loading { .. })
    }

    pub fn item(&self, id: &str) -> Option<&MediaItem> {
        self.items.iter().find(|i| i.id == id)
    }

    pub fn update(&mut self, action: Action) -> Transition {
        match action {
            Action::Refresh => self.restart(),
            Action::SetFilters(filters) => {
                self.filters = filters;
                self.restart()
            }
            Action::SetSort(sort) => {
                self.sort = sort;
                self.restart()
            }
            Action::LoadMore => {
                if self.is_loading() || !self.has_more {
                    return Transition::Unchanged;
                }
                self.request(self.page + 1)
            }
            Action::PageLoaded {
                generation,
                page,
                result,
            } => self.apply_page(generation, page, result),
            Action::PageFailed { generation } => {
                if generation != self.generation {
                    return Transition::Stale;
                }
                self.status = if self.page == 0 {
                    Status::Idle
                } else {
                    Status::Loaded
                };
                Transition::Changed
            }
            Action::Prepend(item) => {
                self.items.retain(|i| i.id != item.id);
                self.items.insert(0, item);
                Transition::Changed
            }
            Action::Replace(item) => match self.items.iter_mut().find(|i| i.id == item.id) {
                Some(slot) => {
                    *slot = item;
                    Transition::Changed
                }
                None => Transition::Unchanged,
            },
            Action::Remove(id) => {
                let before = self.items.len();
                self.items.retain(|i| i.id != id);
                if self.items.len() == before {
                    Transition::Unchanged
                } else {
                    Transition::Changed
                }
            }
            Action::AdjustDownloads { id, delta } => {
                match self.items.iter_mut().find(|i| i.id == id) {
                    Some(item) => {
                        item.downloads = if delta >= 0 {
                            item.downloads.saturating_add(delta.unsigned_abs())
                        } else {
                            item.downloads.saturating_sub(delta.unsigned_abs())
                        };
                        Transition::Changed
                    }
                    None => Transition::Unchanged,
                }
            }
        }
    }

    // Filter or sort changed: drop everything loaded so far before fetching.
    fn restart(&mut self) -> Transition {
        self.items.clear();
        self.page = 0;
        self.has_more = true;
        self.request(1)
    }

    fn request(&mut self, page: u32) -> Transition {
        self.generation += 1;
        self.status = Status::Loading { page };
        Transition::Fetch(PageRequest {
            generation: self.generation,
            page,
            query: build_query(&self.filters, self.sort, page),
        })
    }

    fn apply_page(&mut self, generation: u64, page: u32, result: RowPage) -> Transition {
        if generation != self.generation || self.status != (Status::Loading { page }) {
            return Transition::Stale;
        }

        let fetched = result.rows.len();
        let offset = (page.saturating_sub(1) as usize) * PAGE_SIZE;
        let added = if page == 1 {
            // Items present now were prepended by an add while this page was
            // in flight; keep the ones the page does not already contain.
            let mut items: Vec<MediaItem> = std::mem::take(&mut self.items)
                .into_iter()
                .filter(|kept| result.rows.iter().all(|row| row.id != kept.id))
                .collect();
            items.extend(result.rows);
            self.items = items;
            fetched
        } else {
            let mut added = 0;
            for row in result.rows {
                if self.items.iter().all(|i| i.id != row.id) {
                    self.items.push(row);
                    added += 1;
                }
            }
            added
        };

        self.has_more = match result.total {
            Some(total) => ((offset + fetched) as u64) < total,
            None => fetched == PAGE_SIZE,
        };
        self.page = page;
        self.status = Status::Loaded;
        Transition::Loaded {
            added,
            has_more: self.has_more,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use api_client::{CountMode, MediaKind, Tags, Visibility};
    use chrono::Utc;

    fn item(id: &str) -> MediaItem {
        MediaItem {
            id: id.to_string(),
            kind: MediaKind::Image,
            url: format!("https://x/storage/v1/object/public/media/{}.jpg", id),
            thumbnail_url: format!("https://x/storage/v1/object/public/media/{}.jpg", id),
            title: id.to_string(),
            description: String::new(),
            uploader: "u".into(),
            created_at: Utc::now(),
            category: Category::Art,
            tags: Tags::default(),
            external_link: None,
            allow_download: true,
            visibility: Visibility::Public,
            likes: 0,
            downloads: 5,
            comments: Vec::new(),
        }
    }

    fn page_of(ids: std::ops::Range<usize>, total: Option<u64>) -> RowPage {
        RowPage {
            rows: ids.map(|n| item(&format!("i{:02}", n))).collect(),
            total,
        }
    }

    fn expect_fetch(t: Transition) -> PageRequest {
        match t {
            Transition::Fetch(req) => req,
            other => panic!("expected fetch, got {:?}", other),
        }
    }

    #[test]
    fn test_build_query_search_and_category() {
        let filters = Filters {
            search: Some("  sunset beach ".into()),
            category: CategoryFilter::Only(Category::Nature),
        };
        let query = build_query(&filters, SortOrder::MostLiked, 2);
        assert_eq!(query.offset, 12);
        assert_eq!(query.limit, PAGE_SIZE);
        assert_eq!(query.count, CountMode::Exact);
        assert_eq!(
            query.filters,
            vec![
                Filter::Or(vec![
                    Filter::ILike(Column::Title, "sunset beach".into()),
                    Filter::ILike(Column::Uploader, "sunset beach".into()),
                    Filter::Contains(Column::Tags, vec!["sunset".into()]),
                    Filter::Contains(Column::Tags, vec!["beach".into()]),
                ]),
                Filter::Eq(Column::Category, "Nature".into()),
            ]
        );
        assert_eq!(
            query.order,
            vec![Order::desc(Column::Likes), Order::desc(Column::Id)]
        );
    }

    #[test]
    fn test_build_query_blank_search_and_all() {
        let filters = Filters {
            search: Some("   ".into()),
            category: "All".parse().unwrap(),
        };
        let query = build_query(&filters, SortOrder::Newest, 1);
        assert!(query.filters.is_empty());
        assert_eq!(query.offset, 0);
        assert_eq!(query.order[0], Order::desc(Column::CreatedAt));
    }

    #[test]
    fn test_pagination_has_more_from_total() {
        let mut state = GalleryState::default();
        let req = expect_fetch(state.update(Action::Refresh));
        assert_eq!(req.page, 1);
        assert!(state.is_loading());

        let t = state.update(Action::PageLoaded {
            generation: req.generation,
            page: 1,
            result: page_of(0..12, Some(15)),
        });
        assert_eq!(t, Transition::Loaded { added: 12, has_more: true });

        let req = expect_fetch(state.update(Action::LoadMore));
        assert_eq!(req.page, 2);
        assert_eq!(req.query.offset, 12);
        let t = state.update(Action::PageLoaded {
            generation: req.generation,
            page: 2,
            result: page_of(12..15, Some(15)),
        });
        assert_eq!(t, Transition::Loaded { added: 3, has_more: false });
        assert_eq!(state.items.len(), 15);
        assert_eq!(state.status, Status::Loaded);

        assert_eq!(state.update(Action::LoadMore), Transition::Unchanged);
    }

    #[test]
    fn test_has_more_without_total_uses_page_fill() {
        let mut state = GalleryState::default();
        let req = expect_fetch(state.update(Action::Refresh));
        state.update(Action::PageLoaded {
            generation: req.generation,
            page: 1,
            result: page_of(0..12, None),
        });
        assert!(state.has_more);
        let req = expect_fetch(state.update(Action::LoadMore));
        state.update(Action::PageLoaded {
            generation: req.generation,
            page: 2,
            result: page_of(12..20, None),
        });
        assert!(!state.has_more);
    }

    #[test]
    fn test_load_more_while_loading_is_ignored() {
        let mut state = GalleryState::default();
        let first = expect_fetch(state.update(Action::Refresh));
        assert_eq!(state.update(Action::LoadMore), Transition::Unchanged);
        assert_eq!(state.generation, first.generation);
    }

    #[test]
    fn test_filter_change_replaces_items_and_drops_stale_page() {
        let mut state = GalleryState::default();
        let req = expect_fetch(state.update(Action::Refresh));
        state.update(Action::PageLoaded {
            generation: req.generation,
            page: 1,
            result: page_of(0..12, Some(30)),
        });
        let old = expect_fetch(state.update(Action::LoadMore));

        let new = expect_fetch(state.update(Action::SetFilters(Filters {
            search: Some("cat".into()),
            category: CategoryFilter::All,
        })));
        assert!(state.items.is_empty());
        assert_eq!(new.page, 1);
        assert!(new.generation > old.generation);

        let stale = state.update(Action::PageLoaded {
            generation: old.generation,
            page: 2,
            result: page_of(12..24, Some(30)),
        });
        assert_eq!(stale, Transition::Stale);
        assert!(state.items.is_empty());

        state.update(Action::PageLoaded {
            generation: new.generation,
            page: 1,
            result: page_of(40..42, Some(2)),
        });
        let ids: Vec<&str> = state.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["i40", "i41"]);
    }

    #[test]
    fn test_page_failure_keeps_last_good_state() {
        let mut state = GalleryState::default();
        let req = expect_fetch(state.update(Action::Refresh));
        state.update(Action::PageLoaded {
            generation: req.generation,
            page: 1,
            result: page_of(0..12, Some(20)),
        });
        let req = expect_fetch(state.update(Action::LoadMore));
        assert_eq!(
            state.update(Action::PageFailed { generation: req.generation }),
            Transition::Changed
        );
        assert_eq!(state.status, Status::Loaded);
        assert_eq!(state.page, 1);
        assert_eq!(state.items.len(), 12);

        let retry = expect_fetch(state.update(Action::LoadMore));
        assert_eq!(retry.page, 2);
    }

    #[test]
    fn test_append_skips_items_already_present() {
        let mut state = GalleryState::default();
        let req = expect_fetch(state.update(Action::Refresh));
        state.update(Action::PageLoaded {
            generation: req.generation,
            page: 1,
            result: page_of(0..12, Some(14)),
        });
        state.update(Action::Prepend(item("i12")));
        let req = expect_fetch(state.update(Action::LoadMore));
        let t = state.update(Action::PageLoaded {
            generation: req.generation,
            page: 2,
            result: page_of(12..14, Some(14)),
        });
        assert_eq!(t, Transition::Loaded { added: 1, has_more: false });
        assert_eq!(state.items.len(), 14);
        assert_eq!(state.items[0].id, "i12");
    }

    #[test]
    fn test_item_added_during_refresh_survives_page_one() {
        let mut state = GalleryState::default();
        let req = expect_fetch(state.update(Action::Refresh));
        state.update(Action::Prepend(item("fresh")));
        state.update(Action::Prepend(item("i01")));

        let t = state.update(Action::PageLoaded {
            generation: req.generation,
            page: 1,
            result: page_of(0..3, Some(3)),
        });
        assert_eq!(t, Transition::Loaded { added: 3, has_more: false });
        let ids: Vec<&str> = state.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["fresh", "i00", "i01", "i02"]);
    }

    #[test]
    fn test_item_mutations_by_identity() {
        let mut state = GalleryState::default();
        state.items = vec![item("a"), item("b")];

        assert_eq!(
            state.update(Action::AdjustDownloads { id: "b".into(), delta: 1 }),
            Transition::Changed
        );
        assert_eq!(state.item("b").map(|i| i.downloads), Some(6));
        state.update(Action::AdjustDownloads { id: "b".into(), delta: -1 });
        assert_eq!(state.item("b").map(|i| i.downloads), Some(5));

        let mut renamed = item("a");
        renamed.title = "renamed".into();
        assert_eq!(state.update(Action::Replace(renamed)), Transition::Changed);
        assert_eq!(state.items[0].title, "renamed");
        assert_eq!(state.update(Action::Replace(item("zz"))), Transition::Unchanged);

        assert_eq!(state.update(Action::Remove("a".into())), Transition::Changed);
        assert_eq!(state.update(Action::Remove("a".into())), Transition::Unchanged);
        assert_eq!(state.items.len(), 1);
    }

    #[test]
    fn test_parse_sort_and_category_filter() {
        assert_eq!("most_downloaded".parse::<SortOrder>(), Ok(SortOrder::MostDownloaded));
        assert!("popular".parse::<SortOrder>().is_err());
        assert_eq!("All".parse::<CategoryFilter>(), Ok(CategoryFilter::All));
        assert_eq!(
            "Art".parse::<CategoryFilter>(),
            Ok(CategoryFilter::Only(Category::Art))
        );
        assert!("Cars".parse::<CategoryFilter>().is_err());
    }
}
