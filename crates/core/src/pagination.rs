use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Dir {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    pub dir: Dir,
    pub property: String,
}

impl Sort {
    pub fn asc(property: impl Into<String>) -> Self {
        Sort {
            dir: Dir::Asc,
            property: property.into(),
        }
    }

    pub fn desc(property: impl Into<String>) -> Self {
        Sort {
            dir: Dir::Desc,
            property: property.into(),
        }
    }
}

impl fmt::Display for Sort {
    /// Ledger's `--sort` expression for this key.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.dir {
            Dir::Asc => write!(f, "{}", self.property),
            Dir::Desc => write!(f, "-{}", self.property),
        }
    }
}

impl FromStr for Sort {
    type Err = String;

    /// Accepts `date`, `-date`, `date,asc` and `date,desc`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (property, dir) = match s.split_once(',') {
            Some((property, dir)) => match dir.trim().to_lowercase().as_str() {
                "asc" => (property.trim(), Dir::Asc),
                "desc" => (property.trim(), Dir::Desc),
                other => return Err(format!("Unknown sort direction: '{other}'")),
            },
            None => match s.strip_prefix('-') {
                Some(property) => (property, Dir::Desc),
                None => (s, Dir::Asc),
            },
        };
        if property.is_empty() {
            return Err("Empty sort property".to_string());
        }
        Ok(Sort {
            dir,
            property: property.to_string(),
        })
    }
}

pub const DEFAULT_PAGE_SIZE: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pageable {
    pub page_no: usize,
    pub size: usize,
    #[serde(default)]
    pub sort: Vec<Sort>,
}

impl Default for Pageable {
    fn default() -> Self {
        Self {
            page_no: 0,
            size: DEFAULT_PAGE_SIZE,
            sort: Vec::new(),
        }
    }
}

impl Pageable {
    pub fn new(page_no: usize, size: usize) -> Self {
        Self {
            page_no,
            size,
            sort: Vec::new(),
        }
    }

    pub fn with_sort(mut self, sort: Vec<Sort>) -> Self {
        self.sort = sort;
        self
    }

    /// Index of the first item of this page within the filtered stream.
    pub fn offset(&self) -> usize {
        self.page_no.saturating_mul(self.size)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub content: Vec<T>,
    /// Number of items that passed filtering, across all pages.
    pub total: u64,
    pub pageable: Option<Pageable>,
}

/// Assembles one page from a lazily produced stream of groups in a single pass.
///
/// Groups are filtered; only those whose filtered index falls within the page
/// window are handed to `materialize`, but every passing group is counted. The
/// first error from the stream or from `materialize` aborts the whole page.
pub fn paginate<G, T, E, I, P, M>(
    groups: I,
    mut filter: P,
    mut materialize: M,
    pageable: Option<&Pageable>,
) -> Result<Page<T>, E>
where
    I: IntoIterator<Item = Result<G, E>>,
    P: FnMut(&G) -> bool,
    M: FnMut(G) -> Result<T, E>,
{
    let mut content = Vec::new();
    let mut total: u64 = 0;

    for group in groups {
        let group = group?;
        if !filter(&group) {
            continue;
        }

        let in_window = match pageable {
            None => true,
            Some(p) => total >= p.offset() as u64 && content.len() < p.size,
        };
        if in_window {
            content.push(materialize(group)?);
        }
        total += 1;
    }

    Ok(Page {
        content,
        total,
        pageable: pageable.cloned(),
    })
}
