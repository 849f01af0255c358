use std::collections::VecDeque;

use anyhow::Result;

use crate::api::WikiApi;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Cursor {
    Start,
    Continue(String),
    Exhausted,
}

/// Walks `list=allpages` one batch at a time. The next batch is only
/// requested once every title from the previous one has been handed out.
#[derive(Debug)]
pub struct PageEnumerator {
    pending: VecDeque<String>,
    cursor: Cursor,
}

impl Default for PageEnumerator {
    fn default() -> Self {
        Self::new()
    }
}

impl PageEnumerator {
    pub fn new() -> Self {
        Self {
            pending: VecDeque::new(),
            cursor: Cursor::Start,
        }
    }

    /// Next title, or `None` when the listing is exhausted. A listing error
    /// ends the enumeration; later calls return `None`.
    pub fn next_title<A: WikiApi>(&mut self, api: &mut A) -> Result<Option<String>> {
        loop {
            if let Some(title) = self.pending.pop_front() {
                return Ok(Some(title));
            }

            let continuation = match &self.cursor {
                Cursor::Start => None,
                Cursor::Continue(token) => Some(token.clone()),
                Cursor::Exhausted => return Ok(None),
            };

            let batch = match api.list_pages(continuation.as_deref()) {
                Ok(batch) => batch,
                Err(error) => {
                    self.cursor = Cursor::Exhausted;
                    return Err(error);
                }
            };
            log::debug!(
                "listed {} titles (continue: {})",
                batch.titles.len(),
                batch.continuation.as_deref().unwrap_or("<none>")
            );

            self.cursor = match batch.continuation {
                Some(token) if !token.is_empty() => Cursor::Continue(token),
                _ => Cursor::Exhausted,
            };
            self.pending.extend(batch.titles);
        }
    }
}

/// Iterator over every page title, borrowing the API for its whole lifetime.
pub struct AllPages<'a, A: WikiApi> {
    api: &'a mut A,
    enumerator: PageEnumerator,
}

pub fn all_pages<A: WikiApi>(api: &mut A) -> AllPages<'_, A> {
    AllPages {
        api,
        enumerator: PageEnumerator::new(),
    }
}

impl<A: WikiApi> Iterator for AllPages<'_, A> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.enumerator.next_title(&mut *self.api).transpose()
    }
}
