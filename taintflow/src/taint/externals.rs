//! Taint contracts for well-known external functions.
//!
//! Functions whose bodies are not analyzed (standard-library style) get a
//! fixed propagation contract instead of a computed summary. Static calls
//! key by canonical name (`pkg.Name` or `pkg.(Recv).Name`); invoke calls key
//! by `(method-name, erased-signature)` so any implementor of a well-known
//! interface matches.
//!
//! Input positions count the receiver as position 0 for invoke calls; static
//! calls number their arguments from 0.

use super::types::{Bits, ExternalSummary};
use rustc_hash::FxHashMap;

/// The table of external contracts.
#[derive(Debug, Default)]
pub struct ExternalSummaries {
    by_name: FxHashMap<&'static str, ExternalSummary>,
    by_method: FxHashMap<(&'static str, &'static str), ExternalSummary>,
}

impl ExternalSummaries {
    /// The built-in table.
    #[must_use]
    pub fn builtin() -> ExternalSummaries {
        let mut t = ExternalSummaries::default();

        // Formatters produce a tainted result from any tainted input.
        for name in [
            "fmt.Sprint",
            "fmt.Sprintf",
            "fmt.Sprintln",
            "fmt.Errorf",
            "strings.Join",
            "strings.Repeat",
            "strings.Replace",
            "strings.ReplaceAll",
            "strings.ToLower",
            "strings.ToUpper",
            "strings.TrimSpace",
            "strings.Split",
            "strconv.Itoa",
            "strconv.Quote",
            "bytes.NewBuffer",
            "bytes.NewBufferString",
        ] {
            t.by_name.insert(name, result_from_any());
        }

        // Formatting into a writer taints the writer's storage.
        for name in ["fmt.Fprint", "fmt.Fprintf", "fmt.Fprintln"] {
            t.by_name.insert(
                name,
                ExternalSummary {
                    if_tainted: Bits::EMPTY,
                    tainted_args: Bits::of(&[0]),
                    tainted_rets: Bits::EMPTY,
                },
            );
        }

        // Copy propagates from source (position 1) into destination storage.
        t.by_name.insert(
            "io.Copy",
            ExternalSummary {
                if_tainted: Bits::of(&[1]),
                tainted_args: Bits::of(&[0]),
                tainted_rets: Bits::EMPTY,
            },
        );

        // io.Writer: a tainted payload taints the receiver's storage.
        t.by_method.insert(
            ("Write", "([]byte)(int, error)"),
            ExternalSummary {
                if_tainted: Bits::of(&[1]),
                tainted_args: Bits::of(&[0]),
                tainted_rets: Bits::EMPTY,
            },
        );
        // io.Reader: a tainted receiver fills the buffer with tainted bytes.
        t.by_method.insert(
            ("Read", "([]byte)(int, error)"),
            ExternalSummary {
                if_tainted: Bits::of(&[0]),
                tainted_args: Bits::of(&[1]),
                tainted_rets: Bits::EMPTY,
            },
        );
        // fmt.Stringer and error: rendering a tainted receiver taints the text.
        t.by_method.insert(("String", "()(string)"), result_from_recv());
        t.by_method.insert(("Error", "()(string)"), result_from_recv());

        t
    }

    /// Contract for a static call, by canonical function name.
    #[must_use]
    pub fn lookup_static(&self, canonical_name: &str) -> Option<ExternalSummary> {
        self.by_name.get(canonical_name).copied()
    }

    /// Contract for an invoke call, by method name and erased signature.
    #[must_use]
    pub fn lookup_invoke(&self, method: &str, erased_sig: &str) -> Option<ExternalSummary> {
        self.by_method.get(&(method, erased_sig)).copied()
    }
}

fn result_from_any() -> ExternalSummary {
    ExternalSummary {
        if_tainted: Bits::EMPTY,
        tainted_args: Bits::EMPTY,
        tainted_rets: Bits::of(&[0]),
    }
}

fn result_from_recv() -> ExternalSummary {
    ExternalSummary {
        if_tainted: Bits::of(&[0]),
        tainted_args: Bits::EMPTY,
        tainted_rets: Bits::of(&[0]),
    }
}
