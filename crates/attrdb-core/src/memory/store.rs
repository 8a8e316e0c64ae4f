use crate::db::store::{
    Attribute, ExecutorError, Item, Precondition, PutAttribute, QueryExecutor, SelectPage,
};
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{Mutex, PoisonError},
};

/// Window applied when a select carries no limit clause.
const DEFAULT_SELECT_LIMIT: usize = 100;

const TOKEN_PREFIX: &str = "tok-";

///
/// SelectCall
/// One recorded select, as issued by the caller.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SelectCall {
    pub query: String,
    pub token: Option<String>,
    pub consistent_read: bool,
}

///
/// WriteCall
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum WriteCall {
    Put {
        domain: String,
        item: String,
        puts: Vec<PutAttribute>,
        precondition: Option<Precondition>,
    },
    Delete {
        domain: String,
        item: String,
        names: Vec<String>,
    },
}

type Domain = BTreeMap<String, Vec<Attribute>>;

#[derive(Default)]
struct Inner {
    domains: BTreeMap<String, Domain>,
    selects: Vec<SelectCall>,
    writes: Vec<WriteCall>,
    unavailable: bool,
}

///
/// MemoryStore
///

pub struct MemoryStore {
    inner: Mutex<Inner>,
    page_cap: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::with_page_cap(usize::MAX)
    }

    /// Store that never returns (or counts) more than `page_cap` items per
    /// select, regardless of the requested limit.
    #[must_use]
    pub fn with_page_cap(page_cap: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            page_cap: page_cap.max(1),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ------------------------------------------------------------------
    // Seeding and inspection
    // ------------------------------------------------------------------

    /// Insert (or overwrite) one item directly, bypassing preconditions.
    pub fn insert_item(&self, domain: &str, item: Item) {
        self.lock()
            .domains
            .entry(domain.to_string())
            .or_default()
            .insert(item.name, item.attributes);
    }

    #[must_use]
    pub fn item(&self, domain: &str, name: &str) -> Option<Item> {
        self.lock()
            .domains
            .get(domain)
            .and_then(|d| d.get(name))
            .map(|attributes| Item::new(name, attributes.clone()))
    }

    #[must_use]
    pub fn item_count(&self, domain: &str) -> usize {
        self.lock().domains.get(domain).map_or(0, BTreeMap::len)
    }

    #[must_use]
    pub fn select_log(&self) -> Vec<SelectCall> {
        self.lock().selects.clone()
    }

    #[must_use]
    pub fn write_log(&self) -> Vec<WriteCall> {
        self.lock().writes.clone()
    }

    pub fn clear_logs(&self) {
        let mut inner = self.lock();
        inner.selects.clear();
        inner.writes.clear();
    }

    /// Make every subsequent call fail as a transport error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    // ------------------------------------------------------------------
    // Select evaluation
    // ------------------------------------------------------------------

    fn matching(domain: &Domain, parsed: &ParsedSelect<'_>) -> Vec<Item> {
        let mut items: Vec<Item> = domain
            .iter()
            .filter(|(_, attrs)| parsed.conditions.iter().all(|c| c.matches(attrs)))
            .map(|(name, attrs)| Item::new(name.clone(), attrs.clone()))
            .collect();

        if let Some((attr, descending)) = parsed.ordering {
            items.sort_by(|a, b| {
                let ord = a.first(attr).cmp(&b.first(attr));
                if descending { ord.reverse() } else { ord }
            });
        }

        items
    }
}

impl QueryExecutor for MemoryStore {
    fn select(
        &self,
        query: &str,
        token: Option<&str>,
        consistent_read: bool,
    ) -> Result<SelectPage, ExecutorError> {
        let mut inner = self.lock();
        inner.selects.push(SelectCall {
            query: query.to_string(),
            token: token.map(ToString::to_string),
            consistent_read,
        });
        if inner.unavailable {
            return Err(ExecutorError::Unavailable {
                message: "memory store marked unavailable".to_string(),
            });
        }

        let parsed = ParsedSelect::parse(query)?;
        let start = match token {
            Some(token) => decode_token(token)?,
            None => 0,
        };
        let matches = inner
            .domains
            .get(parsed.domain)
            .map(|d| Self::matching(d, &parsed))
            .unwrap_or_default();

        let window = parsed
            .limit
            .unwrap_or(DEFAULT_SELECT_LIMIT)
            .min(self.page_cap);
        let remaining = matches.len().saturating_sub(start);
        let taken = window.min(remaining);
        let end = start + taken;
        let next_token = (end < matches.len()).then(|| encode_token(end));

        let items = if parsed.count {
            vec![Item::new(
                "Domain",
                vec![Attribute::new("Count", taken.to_string())],
            )]
        } else {
            matches.into_iter().skip(start).take(taken).collect()
        };

        Ok(SelectPage { items, next_token })
    }

    fn put_attributes(
        &self,
        domain: &str,
        item: &str,
        puts: &[PutAttribute],
        precondition: Option<&Precondition>,
    ) -> Result<(), ExecutorError> {
        let mut inner = self.lock();
        inner.writes.push(WriteCall::Put {
            domain: domain.to_string(),
            item: item.to_string(),
            puts: puts.to_vec(),
            precondition: precondition.cloned(),
        });
        if inner.unavailable {
            return Err(ExecutorError::Unavailable {
                message: "memory store marked unavailable".to_string(),
            });
        }

        if let Some(precondition) = precondition {
            let current = inner
                .domains
                .get(domain)
                .and_then(|d| d.get(item))
                .map_or(&[][..], Vec::as_slice);
            check_precondition(current, precondition)?;
        }

        let attrs = inner
            .domains
            .entry(domain.to_string())
            .or_default()
            .entry(item.to_string())
            .or_default();

        let replaced: BTreeSet<&str> = puts
            .iter()
            .filter(|p| p.replace)
            .map(|p| p.name.as_str())
            .collect();
        attrs.retain(|a| !replaced.contains(a.name.as_str()));

        for put in puts {
            let attribute = Attribute::new(put.name.clone(), put.value.clone());
            if !attrs.contains(&attribute) {
                attrs.push(attribute);
            }
        }

        Ok(())
    }

    fn delete_attributes(
        &self,
        domain: &str,
        item: &str,
        names: &[String],
    ) -> Result<(), ExecutorError> {
        let mut inner = self.lock();
        inner.writes.push(WriteCall::Delete {
            domain: domain.to_string(),
            item: item.to_string(),
            names: names.to_vec(),
        });
        if inner.unavailable {
            return Err(ExecutorError::Unavailable {
                message: "memory store marked unavailable".to_string(),
            });
        }

        if let Some(items) = inner.domains.get_mut(domain) {
            if let Some(attrs) = items.get_mut(item) {
                attrs.retain(|a| !names.contains(&a.name));
                if attrs.is_empty() {
                    items.remove(item);
                }
            }
        }

        Ok(())
    }
}

fn check_precondition(
    attrs: &[Attribute],
    precondition: &Precondition,
) -> Result<(), ExecutorError> {
    let holds = match precondition {
        Precondition::Equals { name, value } => {
            let mut values = attrs.iter().filter(|a| &a.name == name);
            matches!((values.next(), values.next()), (Some(a), None) if &a.value == value)
        }
        Precondition::NotExists { name } => !attrs.iter().any(|a| &a.name == name),
    };

    if holds {
        Ok(())
    } else {
        Err(ExecutorError::ConditionFailed {
            message: format!("precondition {precondition:?} does not hold"),
        })
    }
}

fn encode_token(position: usize) -> String {
    format!("{TOKEN_PREFIX}{position}")
}

fn decode_token(token: &str) -> Result<usize, ExecutorError> {
    token
        .strip_prefix(TOKEN_PREFIX)
        .and_then(|p| p.parse().ok())
        .ok_or_else(|| ExecutorError::Rejected {
            message: format!("invalid next token '{token}'"),
        })
}

///
/// ParsedSelect
/// Minimal reading of `select <projection> from `d` [where ..] [order by ..] [limit n]`.
///

struct ParsedSelect<'a> {
    domain: &'a str,
    count: bool,
    conditions: Vec<Condition<'a>>,
    ordering: Option<(&'a str, bool)>,
    limit: Option<usize>,
}

impl<'a> ParsedSelect<'a> {
    fn parse(query: &'a str) -> Result<Self, ExecutorError> {
        let reject = || ExecutorError::Rejected {
            message: format!("unsupported select: {query}"),
        };

        let rest = query.strip_prefix("select ").ok_or_else(reject)?;
        let (projection, rest) = rest.split_once(" from `").ok_or_else(reject)?;
        let (domain, mut rest) = rest.split_once('`').ok_or_else(reject)?;

        let mut limit = None;
        if let Some((head, n)) = rest.rsplit_once(" limit ") {
            limit = Some(n.trim().parse::<usize>().map_err(|_| reject())?);
            rest = head;
        }

        let mut ordering = None;
        if let Some((head, order)) = rest.split_once(" order by ") {
            let mut parts = order.split_whitespace();
            let attr = parts.next().ok_or_else(reject)?;
            let descending = parts.next().is_some_and(|d| d.eq_ignore_ascii_case("desc"));
            ordering = Some((attr, descending));
            rest = head;
        }

        let mut conditions = Vec::new();
        if let Some(filter) = rest.trim().strip_prefix("where ") {
            for clause in filter.split(" and ") {
                conditions.push(Condition::parse(clause).ok_or_else(reject)?);
            }
        } else if !rest.trim().is_empty() {
            return Err(reject());
        }

        Ok(Self {
            domain,
            count: projection.trim() == "count(*)",
            conditions,
            ordering,
            limit,
        })
    }
}

///
/// Condition
///

struct Condition<'a> {
    attr: &'a str,
    value: &'a str,
}

impl<'a> Condition<'a> {
    fn parse(clause: &'a str) -> Option<Self> {
        let (attr, value) = clause.split_once('=')?;
        let value = value.trim();
        let value = value
            .strip_prefix('\'')
            .and_then(|v| v.strip_suffix('\''))
            .unwrap_or(value);

        Some(Self {
            attr: attr.trim(),
            value,
        })
    }

    fn matches(&self, attrs: &[Attribute]) -> bool {
        attrs
            .iter()
            .any(|a| a.name == self.attr && a.value == self.value)
    }
}
