use serde::Serialize;

/// Raw markup for one listing, optionally followed by its detail-page or modal markup.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingFragment(String);

impl ListingFragment {
    pub fn new(markup: impl Into<String>) -> Self {
        ListingFragment(markup.into())
    }

    pub fn with_secondary(listing: impl Into<String>, secondary: &str) -> Self {
        let mut markup = listing.into();
        markup.push_str(secondary);
        ListingFragment(markup)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedListing {
    pub index: usize,
    pub reason: String,
}

/// Fragments collected from one page visit, in traversal order.
#[derive(Debug, Clone, Default)]
pub struct HarvestBatch {
    fragments: Vec<ListingFragment>,
    skipped: Vec<SkippedListing>,
    abandoned: bool,
}

impl HarvestBatch {
    pub fn push(&mut self, fragment: ListingFragment) {
        self.fragments.push(fragment);
    }

    pub fn skip(&mut self, index: usize, reason: impl Into<String>) {
        self.skipped.push(SkippedListing {
            index,
            reason: reason.into(),
        });
    }

    /// Marks the traversal as stopped early; already captured fragments are kept.
    pub fn abandon(&mut self) {
        self.abandoned = true;
    }

    pub fn fragments(&self) -> &[ListingFragment] {
        &self.fragments
    }

    pub fn skipped(&self) -> &[SkippedListing] {
        &self.skipped
    }

    pub fn is_complete(&self) -> bool {
        !self.abandoned
    }

    /// All fragments joined by newlines, ready for normalization.
    pub fn concatenate(&self) -> String {
        self.fragments
            .iter()
            .map(ListingFragment::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn summary(&self) -> HarvestSummary {
        HarvestSummary {
            captured: self.fragments.len(),
            skipped: self.skipped.len(),
            complete: self.is_complete(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HarvestSummary {
    pub captured: usize,
    pub skipped: usize,
    pub complete: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concatenates_in_capture_order() {
        let mut batch = HarvestBatch::default();
        batch.push(ListingFragment::new("<div>a</div>"));
        batch.push(ListingFragment::with_secondary("<div>b</div>", "<p>terms</p>"));

        assert_eq!(
            batch.concatenate(),
            "<div>a</div>\n<div>b</div><p>terms</p>"
        );
    }

    #[test]
    fn summary_reports_skips_and_abandonment() {
        let mut batch = HarvestBatch::default();
        batch.push(ListingFragment::new("x"));
        batch.skip(1, "timed out waiting for .modal-dialog");
        assert_eq!(
            batch.summary(),
            HarvestSummary {
                captured: 1,
                skipped: 1,
                complete: true
            }
        );

        batch.abandon();
        assert!(!batch.summary().complete);
    }
}
