use crate::labels::{Label, LabelMatcher, Matchers};
use crate::series::{SeriesRef, TimeSeries};
use ahash::AHashMap;
use croaring::Bitmap64;
use std::collections::BTreeMap;
use std::sync::RwLock;
use valkey_module::logging::log_warning;

pub type PostingsBitmap = Bitmap64;

/// Composite `name=value` posting key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexKey(String);

impl IndexKey {
    pub fn for_label_value(label_name: &str, value: &str) -> Self {
        Self(format!("{label_name}={value}"))
    }
}

#[derive(Default)]
struct Postings {
    /// label name -> ids carrying the label with any value
    by_label: AHashMap<String, PostingsBitmap>,
    /// `name=value` -> ids carrying exactly that pair
    by_label_value: AHashMap<IndexKey, PostingsBitmap>,
    /// id -> key. Ids are allocated monotonically, so ascending iteration
    /// equals the order series were inserted into the engine.
    key_by_id: BTreeMap<SeriesRef, String>,
}

impl Postings {
    fn add_posting(&mut self, id: SeriesRef, label: &Label) {
        self.by_label
            .entry(label.name.clone())
            .or_default()
            .add(id);
        self.by_label_value
            .entry(IndexKey::for_label_value(&label.name, &label.value))
            .or_default()
            .add(id);
    }

    fn remove_posting(&mut self, id: SeriesRef, label: &Label) {
        if let Some(bmp) = self.by_label.get_mut(&label.name) {
            bmp.remove_checked(id);
            if bmp.is_empty() {
                self.by_label.remove(&label.name);
            }
        }
        let key = IndexKey::for_label_value(&label.name, &label.value);
        if let Some(bmp) = self.by_label_value.get_mut(&key) {
            bmp.remove_checked(id);
            if bmp.is_empty() {
                self.by_label_value.remove(&key);
            }
        }
    }
}

/// Inverted label index over the series of one database:
/// label name -> label value -> set of series. Maintained synchronously with
/// series creation and deletion; never mutated by sample writes.
#[derive(Default)]
pub struct LabelIndex {
    inner: RwLock<Postings>,
}

impl LabelIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index_series(&self, series: &TimeSeries, key: &str) {
        debug_assert!(series.id != 0);
        let mut inner = self.inner.write().expect("label index lock poisoned");
        for label in series.labels.iter() {
            inner.add_posting(series.id, label);
        }
        inner.key_by_id.insert(series.id, key.to_string());
    }

    pub fn remove_series(&self, series: &TimeSeries) {
        let mut inner = self.inner.write().expect("label index lock poisoned");
        if inner.key_by_id.remove(&series.id).is_none() {
            log_warning(format!(
                "Tried to remove non-existing series id {} from index",
                series.id
            ));
        }
        for label in series.labels.iter() {
            inner.remove_posting(series.id, label);
        }
    }

    /// Points an already indexed id at a new key (rename, restore, copy).
    pub fn reindex_series(&self, series: &TimeSeries, key: &str) {
        {
            let inner = self.inner.read().expect("label index lock poisoned");
            if inner.key_by_id.contains_key(&series.id) {
                drop(inner);
                let mut inner = self.inner.write().expect("label index lock poisoned");
                inner.key_by_id.insert(series.id, key.to_string());
                return;
            }
        }
        self.index_series(series, key);
    }

    pub fn has_id(&self, id: SeriesRef) -> bool {
        let inner = self.inner.read().expect("label index lock poisoned");
        inner.key_by_id.contains_key(&id)
    }

    pub fn count(&self) -> usize {
        let inner = self.inner.read().expect("label index lock poisoned");
        inner.key_by_id.len()
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write().expect("label index lock poisoned");
        *inner = Postings::default();
    }

    pub fn swap(&self, other: &LabelIndex) {
        let mut first = self.inner.write().expect("label index lock poisoned");
        let mut second = other.inner.write().expect("label index lock poisoned");
        std::mem::swap(&mut *first, &mut *second);
    }

    /// Evaluates a selector conjunction: the intersection of equality
    /// postings, narrowed by the remaining predicates. Keys come back in
    /// engine insertion order.
    pub fn series_keys_matching(&self, matchers: &Matchers) -> Vec<String> {
        let inner = self.inner.read().expect("label index lock poisoned");

        let mut acc: Option<PostingsBitmap> = None;
        for matcher in matchers.iter() {
            if let LabelMatcher::Equal(name, value) = matcher {
                let Some(postings) = inner
                    .by_label_value
                    .get(&IndexKey::for_label_value(name, value))
                else {
                    return vec![];
                };
                match acc.as_mut() {
                    None => acc = Some(postings.clone()),
                    Some(acc) => acc.and_inplace(postings),
                }
            }
        }

        // selector validation guarantees at least one equality predicate
        let Some(mut acc) = acc else {
            return vec![];
        };

        for matcher in matchers.iter() {
            if acc.is_empty() {
                return vec![];
            }
            match matcher {
                LabelMatcher::Equal(..) => {}
                LabelMatcher::NotEqual(name, value) => {
                    match inner.by_label.get(name) {
                        Some(present) => acc.and_inplace(present),
                        None => return vec![],
                    }
                    if let Some(equal) = inner
                        .by_label_value
                        .get(&IndexKey::for_label_value(name, value))
                    {
                        acc.andnot_inplace(equal);
                    }
                }
                LabelMatcher::Absent(name) => {
                    if let Some(present) = inner.by_label.get(name) {
                        acc.andnot_inplace(present);
                    }
                }
                LabelMatcher::Present(name) => match inner.by_label.get(name) {
                    Some(present) => acc.and_inplace(present),
                    None => return vec![],
                },
            }
        }

        acc.iter()
            .filter_map(|id| inner.key_by_id.get(&id).cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::parse_selector_list;
    use crate::series::TimeSeries;

    fn make_series(id: SeriesRef, labels: &[(&str, &str)]) -> TimeSeries {
        let mut series = TimeSeries::new();
        series.id = id;
        series.labels = labels
            .iter()
            .map(|(name, value)| Label::new(*name, *value))
            .collect();
        series
    }

    fn fixture() -> (LabelIndex, Vec<TimeSeries>) {
        let index = LabelIndex::new();
        let series = vec![
            make_series(
                1,
                &[("name", "bob"), ("class", "middle"), ("generation", "x")],
            ),
            make_series(
                2,
                &[("name", "rudy"), ("class", "junior"), ("generation", "x")],
            ),
            make_series(
                3,
                &[
                    ("name", "fabi"),
                    ("class", "top"),
                    ("generation", "x"),
                    ("x", "2"),
                ],
            ),
            make_series(
                4,
                &[
                    ("name", "anybody"),
                    ("class", "top"),
                    ("type", "noone"),
                    ("x", "2"),
                    ("z", "3"),
                ],
            ),
        ];
        for (i, s) in series.iter().enumerate() {
            index.index_series(s, &format!("tester{}", i + 1));
        }
        (index, series)
    }

    fn query(index: &LabelIndex, selectors: &[&str]) -> Vec<String> {
        let matchers = parse_selector_list(selectors.iter().copied()).unwrap();
        index.series_keys_matching(&matchers)
    }

    #[test]
    fn equality_matches_in_insertion_order() {
        let (index, _) = fixture();
        assert_eq!(
            query(&index, &["generation=x"]),
            vec!["tester1", "tester2", "tester3"]
        );
        assert_eq!(query(&index, &["x=2"]), vec!["tester3", "tester4"]);
    }

    #[test]
    fn absent_predicate_excludes_carriers() {
        let (index, _) = fixture();
        assert_eq!(
            query(&index, &["generation=x", "x="]),
            vec!["tester1", "tester2"]
        );
        assert_eq!(query(&index, &["generation=x", "x=2"]), vec!["tester3"]);
    }

    #[test]
    fn not_equal_requires_presence_with_other_value() {
        let (index, _) = fixture();
        assert_eq!(
            query(&index, &["generation=x", "class!=top"]),
            vec!["tester1", "tester2"]
        );
        assert_eq!(
            query(&index, &["generation=x", "class!=middle", "x="]),
            vec!["tester2"]
        );
    }

    #[test]
    fn conjunction_can_be_empty() {
        let (index, _) = fixture();
        assert!(query(&index, &["generation=x", "class=top", "x="]).is_empty());
        assert_eq!(
            query(&index, &["generation=x", "class=top", "z="]),
            vec!["tester3"]
        );
    }

    #[test]
    fn unknown_label_or_value_matches_nothing() {
        let (index, _) = fixture();
        assert!(query(&index, &["generation=z"]).is_empty());
        assert!(query(&index, &["missing=1"]).is_empty());
    }

    #[test]
    fn removal_unindexes_the_series() {
        let (index, series) = fixture();
        index.remove_series(&series[2]);
        assert_eq!(
            query(&index, &["generation=x"]),
            vec!["tester1", "tester2"]
        );
        assert_eq!(query(&index, &["x=2"]), vec!["tester4"]);
        assert_eq!(index.count(), 3);
    }

    #[test]
    fn result_depends_only_on_current_label_state() {
        let (index, series) = fixture();
        // remove and re-add: selection outcome is unchanged
        index.remove_series(&series[1]);
        index.index_series(&series[1], "tester2");
        assert_eq!(
            query(&index, &["generation=x"]),
            vec!["tester1", "tester2", "tester3"]
        );
    }

    #[test]
    fn reindex_moves_id_to_new_key() {
        let (index, series) = fixture();
        index.reindex_series(&series[0], "renamed");
        assert_eq!(
            query(&index, &["name=bob"]),
            vec!["renamed"]
        );
    }
}
