use serde::Serialize;
use std::num::IntErrorKind;

/// Splits `count` ordered items into pages of `per_page`.
///
/// There is always at least one page, so an empty listing still renders as
/// page 1 of 1.
#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    count: usize,
    per_page: usize,
}

impl Paginator {
    pub fn new(count: usize, per_page: usize) -> Self {
        Paginator { count, per_page: per_page.max(1) }
    }

    pub fn num_pages(&self) -> usize {
        self.count.div_ceil(self.per_page).max(1)
    }

    /// Turns the raw `?page=` value into a valid page number. Missing or
    /// non-numeric input gives the first page; numbers outside the range are
    /// clamped to the nearest existing page.
    pub fn resolve(&self, raw: Option<&str>) -> usize {
        match raw.map(|s| s.trim().parse::<i64>()) {
            None => 1,
            Some(Ok(n)) if n < 1 => 1,
            Some(Ok(n)) => (n as u64).min(self.num_pages() as u64) as usize,
            Some(Err(e)) if *e.kind() == IntErrorKind::PosOverflow => self.num_pages(),
            Some(Err(_)) => 1,
        }
    }

    pub fn offset(&self, number: usize) -> usize {
        (number.max(1) - 1) * self.per_page
    }

    pub fn per_page(&self) -> usize {
        self.per_page
    }

    pub fn page<T>(&self, number: usize, items: Vec<T>) -> Page<T> {
        let num_pages = self.num_pages();
        let number = number.clamp(1, num_pages);
        Page {
            items,
            number,
            num_pages,
            count: self.count,
            has_previous: number > 1,
            has_next: number < num_pages,
            previous_page_number: if number > 1 { Some(number - 1) } else { None },
            next_page_number: if number < num_pages { Some(number + 1) } else { None },
        }
    }
}

/// One page of a listing, shaped for the templates.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: usize,
    pub num_pages: usize,
    pub count: usize,
    pub has_previous: bool,
    pub has_next: bool,
    pub previous_page_number: Option<usize>,
    pub next_page_number: Option<usize>,
}
