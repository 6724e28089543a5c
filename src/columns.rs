use crate::filter::ColumnSelector;

/// Ordered column choices offered by every column selector.
///
/// The wildcard always comes first, followed by the headers in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnOptions {
    options: Vec<ColumnSelector>,
}

impl Default for ColumnOptions {
    fn default() -> Self {
        Self {
            options: vec![ColumnSelector::All],
        }
    }
}

impl ColumnOptions {
    pub fn build<S: AsRef<str>>(headers: &[S]) -> Self {
        let mut options = Vec::with_capacity(headers.len() + 1);
        options.push(ColumnSelector::All);
        options.extend(
            headers
                .iter()
                .map(|h| ColumnSelector::Named(h.as_ref().to_string())),
        );
        Self { options }
    }

    pub fn options(&self) -> &[ColumnSelector] {
        &self.options
    }

    pub fn contains(&self, selector: &ColumnSelector) -> bool {
        self.options.contains(selector)
    }

    /// Keep `previous` if it is still offered, else fall back to the wildcard.
    pub fn resolve(&self, previous: &ColumnSelector) -> ColumnSelector {
        if self.contains(previous) {
            previous.clone()
        } else {
            ColumnSelector::All
        }
    }

    pub fn next(&self, current: &ColumnSelector) -> ColumnSelector {
        self.step(current, 1)
    }

    pub fn previous(&self, current: &ColumnSelector) -> ColumnSelector {
        self.step(current, -1)
    }

    fn step(&self, current: &ColumnSelector, step: isize) -> ColumnSelector {
        let n = self.options.len() as isize;
        let pos = self
            .options
            .iter()
            .position(|o| o == current)
            .unwrap_or(0) as isize;
        self.options[(pos + step).rem_euclid(n) as usize].clone()
    }
}
