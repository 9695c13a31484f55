//! Minimal writer for the text exposition format, gauges only.

use std::fmt::Write as _;

/// A named gauge with its help text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gauge {
    pub name: &'static str,
    pub help: &'static str,
}

/// Accumulates one exposition document.
#[derive(Debug, Default)]
pub struct ExpositionWriter {
    buf: String,
}

impl ExpositionWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a family with its `# HELP` and `# TYPE` lines.
    pub fn family(&mut self, gauge: Gauge) {
        let _ = writeln!(self.buf, "# HELP {} {}", gauge.name, gauge.help);
        let _ = writeln!(self.buf, "# TYPE {} gauge", gauge.name);
    }

    /// Appends one series; labels keep the given order.
    pub fn sample(&mut self, gauge: Gauge, labels: &[(&str, &str)], value: u64) {
        self.buf.push_str(gauge.name);
        self.buf.push('{');
        for (i, (key, val)) in labels.iter().enumerate() {
            if i > 0 {
                self.buf.push(',');
            }
            self.buf.push_str(key);
            self.buf.push_str("=\"");
            escape_label_value(&mut self.buf, val);
            self.buf.push('"');
        }
        let _ = writeln!(self.buf, "}} {value}");
    }

    pub fn finish(self) -> String {
        self.buf
    }
}

fn escape_label_value(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
}
