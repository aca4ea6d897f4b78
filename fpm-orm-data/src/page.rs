use serde::{Deserialize, Serialize};

use crate::error::{DataError, DataResult};
use crate::sql::Dialect;

/// Offset/limit window of a query. `limit = -1` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pager {
    pub skip: i64,
    pub limit: i64,
}

impl Default for Pager {
    fn default() -> Self {
        Self::UNBOUNDED
    }
}

impl Pager {
    pub const UNBOUNDED: Pager = Pager { skip: 0, limit: -1 };

    pub fn new(skip: i64, limit: i64) -> DataResult<Self> {
        let pager = Pager { skip, limit };
        pager.validate()?;
        Ok(pager)
    }

    /// A window of `size` rows starting at page `page` (zero-based).
    pub fn page(page: i64, size: i64) -> DataResult<Self> {
        Self::new(page.saturating_mul(size), size)
    }

    pub fn is_bounded(&self) -> bool {
        self.limit >= 0
    }

    pub(crate) fn validate(&self) -> DataResult<()> {
        if self.skip < 0 {
            return Err(DataError::Validation(format!(
                "pager skip must be >= 0, got {}",
                self.skip
            )));
        }
        if self.limit < -1 {
            return Err(DataError::Validation(format!(
                "pager limit must be >= -1, got {}",
                self.limit
            )));
        }
        Ok(())
    }

    /// The `LIMIT`/`OFFSET` tail of a SELECT, with a leading space, or an
    /// empty string when the window is unbounded from offset zero.
    pub(crate) fn render(&self, dialect: Dialect) -> String {
        let mut sql = String::new();
        if self.is_bounded() {
            sql.push_str(&format!(" LIMIT {}", self.limit));
        } else if self.skip > 0 {
            if let Some(unbounded) = dialect.unbounded_limit() {
                sql.push_str(&format!(" LIMIT {unbounded}"));
            }
        }
        if self.skip > 0 {
            sql.push_str(&format!(" OFFSET {}", self.skip));
        }
        sql
    }
}

/// Rows of one window together with the total number of matching rows.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub count: u64,
    pub rows: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(rows: Vec<T>, count: u64) -> Self {
        Self { count, rows }
    }

    /// Number of pages of `size` rows needed to hold `count` rows.
    pub fn total_pages(&self, size: u64) -> u64 {
        if size == 0 {
            0
        } else {
            self.count.div_ceil(size)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_unbounded() {
        let pager = Pager::default();
        assert_eq!(pager, Pager { skip: 0, limit: -1 });
        assert_eq!(pager.render(Dialect::Postgres), "");
    }

    #[test]
    fn test_render_window() {
        let pager = Pager::new(20, 10).unwrap();
        assert_eq!(pager.render(Dialect::Sqlite), " LIMIT 10 OFFSET 20");
    }

    #[test]
    fn test_offset_without_limit() {
        let pager = Pager::new(5, -1).unwrap();
        assert_eq!(pager.render(Dialect::Sqlite), " LIMIT -1 OFFSET 5");
        assert_eq!(pager.render(Dialect::Postgres), " OFFSET 5");
    }

    #[test]
    fn test_rejects_negative_skip() {
        assert!(Pager::new(-1, 10).is_err());
        assert!(Pager::new(0, -2).is_err());
    }

    #[test]
    fn test_total_pages() {
        let page = Page::new(vec![1, 2, 3], 21);
        assert_eq!(page.total_pages(10), 3);
        assert_eq!(page.total_pages(0), 0);
        assert_eq!(Pager::page(2, 10).unwrap(), Pager { skip: 20, limit: 10 });
    }
}
