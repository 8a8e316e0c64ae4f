//! Module: cursor
//! Responsibility: lazy, token-paginated materialization of one select,
//! offset emulation through count-only queries, and authoritative counts.
//! Does not own: query text construction or item hydration.

mod iter;

pub use iter::CursorIter;

use crate::{
    config::{Config, MAX_RESULTS_PER_REQUEST},
    db::{
        query::{QuerySpec, with_limit},
        store::{QueryExecutor, SelectPage},
    },
    error::{ErrorOrigin, InternalError},
    obs::sink::{self, ExecKind, MetricsEvent, SelectPhase, Span},
    traits::Hydrate,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, trace};

///
/// Resume
/// Position reached by the offset pass; shared by fetch and count passes.
///

#[derive(Clone, Debug)]
struct Resume {
    token: Option<String>,
    exhausted: bool,
}

///
/// FetchState
///

#[derive(Debug, Default)]
struct FetchState {
    token: Option<String>,
    started: bool,
    exhausted: bool,

    /// Items received from the store, independent of local edits.
    loaded: u32,
}

///
/// CursorState
///

struct CursorState<T> {
    items: Vec<T>,
    fetch: FetchState,
    resume: Option<Resume>,
    count: Option<usize>,
    page_size: u32,
    consistent_read: bool,
    load_all_on_size: bool,
}

///
/// Cursor
///
/// Append-only view over the results of one [`QuerySpec`]. Every operation
/// that may reach the store holds the state lock for its whole duration, so
/// concurrent callers never overlap page fetches or offset windows.
///

pub struct Cursor<T> {
    spec: QuerySpec,
    executor: Arc<dyn QueryExecutor>,
    hydrator: Arc<dyn Hydrate<T>>,
    debug: bool,
    state: Mutex<CursorState<T>>,
}

impl<T> Cursor<T> {
    /// Bind a cursor to one spec. No store call is made until data is needed.
    ///
    /// Consistent reads are used only when both the spec and the config ask
    /// for them. With a limit, the page size never exceeds that limit.
    pub fn new(
        spec: QuerySpec,
        executor: Arc<dyn QueryExecutor>,
        hydrator: Arc<dyn Hydrate<T>>,
        config: &Config,
    ) -> Self {
        let mut page_size = config.cursor.effective_page_size();
        if let Some(limit) = spec.get_limit() {
            page_size = page_size.min(limit.max(1));
        }

        let mut state = CursorState {
            items: Vec::new(),
            fetch: FetchState::default(),
            resume: None,
            count: None,
            page_size,
            consistent_read: spec.is_consistent_read() && config.cursor.consistent_read,
            load_all_on_size: config.cursor.load_all_on_size,
        };

        // zero limit: nothing can ever be returned
        if spec.get_limit() == Some(0) {
            state.fetch = FetchState {
                token: None,
                started: true,
                exhausted: true,
                loaded: 0,
            };
            state.count = Some(0);
        }

        Self {
            spec,
            executor,
            hydrator,
            debug: config.debug,
            state: Mutex::new(state),
        }
    }

    #[must_use]
    pub const fn spec(&self) -> &QuerySpec {
        &self.spec
    }

    fn lock(&self) -> MutexGuard<'_, CursorState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ------------------------------------------------------------------
    // Settings
    // ------------------------------------------------------------------

    /// Items requested per select; clamped to `1..=2500`.
    pub fn set_page_size(&self, page_size: u32) {
        self.lock().page_size = page_size.clamp(1, MAX_RESULTS_PER_REQUEST);
    }

    pub fn set_consistent_read(&self, consistent_read: bool) {
        self.lock().consistent_read = consistent_read;
    }

    pub fn set_load_all_on_size(&self, load_all_on_size: bool) {
        self.lock().load_all_on_size = load_all_on_size;
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Number of results for the spec, honoring limit and offset.
    ///
    /// Counts through count-only queries unless full materialization was
    /// requested. Once known, the count never changes for this cursor.
    pub fn size(&self) -> Result<usize, InternalError> {
        let mut state = self.lock();
        if let Some(count) = state.count {
            return Ok(count);
        }

        if state.load_all_on_size {
            let through = self
                .spec
                .get_limit()
                .map_or(usize::MAX, |limit| limit.saturating_sub(1) as usize);
            self.fetch_through(&mut state, through)?;

            let len = state.items.len();
            if state.fetch.exhausted {
                state.count = Some(len);
            }

            return Ok(len);
        }

        self.count(&mut state)
    }

    pub fn is_empty(&self) -> Result<bool, InternalError> {
        let mut state = self.lock();
        self.fetch_through(&mut state, 0)?;

        Ok(state.items.is_empty())
    }

    /// Materialized entries, without triggering I/O.
    #[must_use]
    pub fn fetched_size(&self) -> usize {
        self.lock().items.len()
    }

    #[must_use]
    pub fn iter(&self) -> CursorIter<'_, T> {
        CursorIter::new(self)
    }

    /// Fetch pages until `index` is materialized, then return a read of it.
    fn read_at<R>(&self, index: usize, f: impl FnOnce(&T) -> R) -> Result<Option<R>, InternalError> {
        trace!(domain = self.spec.domain(), index, "cursor index access");

        let mut state = self.lock();
        self.fetch_through(&mut state, index)?;

        Ok(state.items.get(index).map(f))
    }

    // ------------------------------------------------------------------
    // Local edits (never reach the store)
    // ------------------------------------------------------------------

    /// Replace a materialized entry, returning the previous one.
    pub fn set(&self, index: usize, value: T) -> Result<T, InternalError> {
        let mut state = self.lock();
        let len = state.items.len();
        let slot = state
            .items
            .get_mut(index)
            .ok_or_else(|| InternalError::index_out_of_range(index, len))?;

        Ok(std::mem::replace(slot, value))
    }

    /// Insert into the materialized entries; `index` may equal their length.
    pub fn insert(&self, index: usize, value: T) -> Result<(), InternalError> {
        let mut state = self.lock();
        let len = state.items.len();
        if index > len {
            return Err(InternalError::index_out_of_range(index, len));
        }
        state.items.insert(index, value);

        Ok(())
    }

    pub fn remove(&self, index: usize) -> Result<T, InternalError> {
        let mut state = self.lock();
        let len = state.items.len();
        if index >= len {
            return Err(InternalError::index_out_of_range(index, len));
        }

        Ok(state.items.remove(index))
    }

    // ------------------------------------------------------------------
    // Fetch pass
    // ------------------------------------------------------------------

    fn fetch_through(&self, state: &mut CursorState<T>, index: usize) -> Result<(), InternalError> {
        if state.items.len() > index || state.fetch.exhausted {
            return Ok(());
        }

        let mut span = Span::new(ExecKind::Load, self.spec.domain());
        let before = state.items.len();
        while state.items.len() <= index && !state.fetch.exhausted {
            self.fetch_page(state)?;
        }
        span.set_rows((state.items.len() - before) as u64);

        Ok(())
    }

    fn fetch_page(&self, state: &mut CursorState<T>) -> Result<(), InternalError> {
        if !state.fetch.started {
            let resume = self.resume(state)?;
            state.fetch.token = resume.token;
            state.fetch.exhausted = resume.exhausted;
            state.fetch.started = true;
            if state.fetch.exhausted {
                return Ok(());
            }
        }

        let window = self.window(state.page_size, state.fetch.loaded);
        if window == 0 {
            state.fetch.exhausted = true;
            return Ok(());
        }

        let query = with_limit(&self.spec.select_text(), window);
        let page = self.select(
            SelectPhase::Fetch,
            &query,
            state.fetch.token.as_deref(),
            state.consistent_read,
        )?;

        let received = page.items.len();
        if received > window as usize {
            return Err(InternalError::over_fetch(window, received).with_query(self.spec.domain(), query));
        }

        let hydrated = page
            .items
            .into_iter()
            .map(|item| self.hydrator.hydrate(item))
            .collect::<Result<Vec<_>, _>>()?;
        state.items.extend(hydrated);

        let received_u32 = u32::try_from(received).unwrap_or(u32::MAX);
        state.fetch.loaded = state.fetch.loaded.saturating_add(received_u32);
        state.fetch.token = page.next_token;

        let limit_reached = self
            .spec
            .get_limit()
            .is_some_and(|limit| state.fetch.loaded >= limit);
        state.fetch.exhausted = state.fetch.token.is_none() || limit_reached;

        debug!(
            domain = self.spec.domain(),
            received,
            total = state.items.len(),
            exhausted = state.fetch.exhausted,
            "fetched page"
        );

        Ok(())
    }

    // ------------------------------------------------------------------
    // Count pass
    // ------------------------------------------------------------------

    fn count(&self, state: &mut CursorState<T>) -> Result<usize, InternalError> {
        if let Some(count) = state.count {
            return Ok(count);
        }

        let mut span = Span::new(ExecKind::Count, self.spec.domain());
        let resume = self.resume(state)?;
        let mut total: u32 = 0;

        if resume.exhausted {
            debug!(
                domain = self.spec.domain(),
                "offset consumed every match, count is zero"
            );
        } else {
            let text = self.spec.count_text();
            let mut token = resume.token;

            loop {
                let window = self.window(state.page_size, total);
                if window == 0 {
                    break;
                }

                let query = with_limit(&text, window);
                let page = self.select(
                    SelectPhase::Count,
                    &query,
                    token.as_deref(),
                    state.consistent_read,
                )?;

                let reported = page.reported_count();
                if reported > u64::from(window) {
                    return Err(InternalError::over_fetch(
                        window,
                        usize::try_from(reported).unwrap_or(usize::MAX),
                    )
                    .with_query(self.spec.domain(), query));
                }

                total = total.saturating_add(u32::try_from(reported).unwrap_or(u32::MAX));
                token = page.next_token;

                let limit_reached = self.spec.get_limit().is_some_and(|limit| total >= limit);
                if token.is_none() || limit_reached {
                    break;
                }
            }
        }

        let count = total as usize;
        span.set_rows(u64::from(total));
        state.count = Some(count);
        debug!(domain = self.spec.domain(), count, "computed count");

        Ok(count)
    }

    // ------------------------------------------------------------------
    // Offset pass
    // ------------------------------------------------------------------

    /// Position after the emulated offset. Runs at most once per cursor.
    fn resume(&self, state: &mut CursorState<T>) -> Result<Resume, InternalError> {
        if let Some(resume) = &state.resume {
            return Ok(resume.clone());
        }

        let resume = match self.spec.get_offset() {
            None => Resume {
                token: None,
                exhausted: false,
            },
            Some(offset) => self.skip_offset(offset, state.consistent_read)?,
        };
        state.resume = Some(resume.clone());

        Ok(resume)
    }

    fn skip_offset(&self, offset: u32, consistent_read: bool) -> Result<Resume, InternalError> {
        let text = self.spec.count_text();
        let mut consumed: u64 = 0;
        let mut token: Option<String> = None;

        loop {
            let remaining = u64::from(offset).saturating_sub(consumed);
            let window = u32::try_from(remaining)
                .unwrap_or(u32::MAX)
                .min(MAX_RESULTS_PER_REQUEST);
            let query = with_limit(&text, window);
            let page = self.select(SelectPhase::Offset, &query, token.as_deref(), consistent_read)?;

            consumed = consumed.saturating_add(page.reported_count());
            if consumed > u64::from(offset) {
                return Err(InternalError::query_inconsistency(format!(
                    "offset pass overshot: requested {offset}, store counted {consumed}"
                ))
                .with_query(self.spec.domain(), query));
            }

            token = page.next_token;
            if consumed == u64::from(offset) || token.is_none() {
                break;
            }
        }

        debug!(
            domain = self.spec.domain(),
            offset,
            consumed,
            exhausted = token.is_none(),
            "applied offset"
        );

        Ok(Resume {
            exhausted: token.is_none(),
            token,
        })
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    /// Window for the next page given how many results were already taken.
    fn window(&self, page_size: u32, taken: u32) -> u32 {
        match self.spec.get_limit() {
            Some(limit) => page_size.min(limit.saturating_sub(taken)),
            None => page_size,
        }
    }

    fn select(
        &self,
        phase: SelectPhase,
        query: &str,
        token: Option<&str>,
        consistent_read: bool,
    ) -> Result<SelectPage, InternalError> {
        let domain = self.spec.domain();
        if self.debug {
            info!(domain, query, token, "select");
        }

        let page = self
            .executor
            .select(query, token, consistent_read)
            .map_err(|err| InternalError::select_failed(ErrorOrigin::Cursor, domain, query, &err))?;

        sink::record(MetricsEvent::Select {
            phase,
            domain,
            items: page.items.len() as u64,
        });

        Ok(page)
    }
}

impl<T: Clone> Cursor<T> {
    /// Entry at `index`, fetching pages as needed.
    pub fn get(&self, index: usize) -> Result<T, InternalError> {
        self.read_at(index, T::clone)?.ok_or_else(|| {
            let len = self.fetched_size();
            InternalError::index_out_of_range(index, len)
        })
    }

    /// Materialize every result and return them in order.
    pub fn to_vec(&self) -> Result<Vec<T>, InternalError> {
        self.iter().collect()
    }
}
