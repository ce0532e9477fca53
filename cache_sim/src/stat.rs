//! Text report of the counters, built from per-section views.

use std::fmt;

pub trait Stat {
    fn view(&self, max_width: usize) -> Box<dyn StatView + '_>;
}

pub trait StatView: fmt::Display {
    /// section title, printed above the body
    fn header(&self) -> &'static str;
    /// widest line of the body
    fn width(&self) -> usize;
}

pub trait AddStats {
    /// appends this component's sections to `buf`.
    fn add_stats(&self, buf: &mut Stats);
}

/// Sections in report order.
#[derive(Default)]
pub struct Stats {
    sections: Vec<Box<dyn Stat>>,
}

impl Stats {
    pub fn push(&mut self, stat: Box<dyn Stat>) {
        self.sections.push(stat)
    }
    pub fn len(&self) -> usize {
        self.sections.len()
    }
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
    pub fn view(&self, max_width: usize) -> StatAllView<'_> {
        StatAllView {
            views: self.sections.iter().map(|s| s.view(max_width)).collect(),
            max_width,
        }
    }
}

pub struct StatAllView<'s> {
    views: Vec<Box<dyn StatView + 's>>,
    max_width: usize,
}

impl StatAllView<'_> {
    /// width of the ruled lines around the report.
    fn rule_width(&self) -> usize {
        let widest = self
            .views
            .iter()
            .map(|v| v.header().len().max(v.width()))
            .max()
            .unwrap_or(0);
        widest.min(self.max_width).max(TITLE.len())
    }
}

const TITLE: &str = " statistics ";

impl fmt::Display for StatAllView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.rule_width();
        writeln!(f, "{TITLE:-^width$}")?;
        for v in &self.views {
            writeln!(f, "{}:", v.header())?;
            writeln!(f, "{v}")?;
        }
        write!(f, "{:-<width$}", "")
    }
}

/// `100 * n / d` formatted for the views, `0` when nothing was counted.
pub(crate) fn pct(n: u64, d: u64) -> String {
    let v = if d == 0 { 0. } else { 100. * n as f64 / d as f64 };
    format!("{v:.6}")
}
