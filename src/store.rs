use crate::models::UrlRecord;
use chrono::Utc;
use std::sync::Arc;

/// The links created during one dashboard session, newest first.
///
/// Every mutation publishes a fresh snapshot instead of editing in place, so
/// a snapshot handed out earlier never changes underneath its holder and two
/// snapshots can be compared by identity.
#[derive(Debug, Clone, Default)]
pub struct UrlStore {
    records: Arc<Vec<UrlRecord>>,
}

impl UrlStore {
    #[cfg(test)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a freshly created record at the front.
    pub fn push_newest(&mut self, record: UrlRecord) {
        let mut next = Vec::with_capacity(self.records.len() + 1);
        next.push(record);
        next.extend(self.records.iter().cloned());
        self.records = Arc::new(next);
    }

    /// Swap the whole list for `records`, which must already be newest first.
    pub fn replace_all(&mut self, records: Vec<UrlRecord>) {
        self.records = Arc::new(records);
    }

    /// The current contents.
    pub fn snapshot(&self) -> Arc<Vec<UrlRecord>> {
        Arc::clone(&self.records)
    }

    pub fn contains_short_url(&self, short_url: &str) -> bool {
        self.records.iter().any(|r| r.short_url == short_url)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// The sample link a fresh session starts with.
pub fn demo_records(short_base_url: &str) -> Vec<UrlRecord> {
    vec![UrlRecord {
        id: "1".into(),
        original_url: "https://example.com".into(),
        short_url: format!("{short_base_url}/abc123"),
        clicks: 15,
        created_at: Utc::now(),
        is_password_protected: false,
        is_active: true,
        password_attempts: 0,
    }]
}
