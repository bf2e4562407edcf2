//! Tokenizer for GPU counter instance names.
//!
//! GPU counters expose their identity through the instance name, e.g.
//! `pid_4242_luid_0x00000000_0x0000d1a3_phys_0_eng_3_engtype_3D`. Memory
//! counters carry only `pid`, `luid` and `phys`; engine counters add `eng` and
//! `engtype`. Fields may appear in any order and any of them may be missing.

use std::fmt;

/// Adapter LUID, in the order the counter name prints it (high part first).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct Luid {
    pub high: u32,
    pub low: u32,
}

/// Best-effort structured view of a counter instance name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CounterName {
    pub pid: Option<u32>,
    pub luid: Option<Luid>,
    pub phys: Option<u32>,
    pub engine_index: Option<u32>,
    pub engine_type: Option<String>,
}

impl CounterName {
    /// Parses an instance name. Unknown tokens are skipped and malformed
    /// values leave the corresponding field empty; this never fails.
    pub fn parse(name: &str) -> Self {
        let mut parsed = CounterName::default();
        let mut tokens = name.split('_');

        while let Some(token) = tokens.next() {
            match token {
                "pid" => parsed.pid = tokens.next().and_then(parse_decimal),
                "luid" => {
                    let high = tokens.next().and_then(parse_hex);
                    let low = tokens.next().and_then(parse_hex);
                    parsed.luid = match (high, low) {
                        (Some(high), Some(low)) => Some(Luid { high, low }),
                        _ => None,
                    };
                }
                "phys" => parsed.phys = tokens.next().and_then(parse_decimal),
                "eng" => parsed.engine_index = tokens.next().and_then(parse_decimal),
                "engtype" => {
                    parsed.engine_type = tokens
                        .next()
                        .filter(|t| !t.is_empty())
                        .map(str::to_string);
                }
                _ => {}
            }
        }

        parsed
    }

    /// `name_value` segments for every present field, in canonical order.
    pub fn segments(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(5);
        if let Some(pid) = self.pid {
            out.push(format!("pid_{pid}"));
        }
        if let Some(luid) = self.luid {
            out.push(format!("luid_0x{:08x}_0x{:08x}", luid.high, luid.low));
        }
        if let Some(phys) = self.phys {
            out.push(format!("phys_{phys}"));
        }
        if let Some(eng) = self.engine_index {
            out.push(format!("eng_{eng}"));
        }
        if let Some(ty) = &self.engine_type {
            out.push(format!("engtype_{ty}"));
        }
        out
    }
}

impl fmt::Display for CounterName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments().join("_"))
    }
}

fn parse_decimal(token: &str) -> Option<u32> {
    token.parse().ok()
}

fn parse_hex(token: &str) -> Option<u32> {
    let digits = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token);
    u32::from_str_radix(digits, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_engine_counter_name() {
        let name = CounterName::parse("pid_4242_luid_1a_2b_phys_0_eng_3_engtype_3D");
        assert_eq!(name.pid, Some(4242));
        assert_eq!(name.luid, Some(Luid { high: 0x1a, low: 0x2b }));
        assert_eq!(name.phys, Some(0));
        assert_eq!(name.engine_index, Some(3));
        assert_eq!(name.engine_type.as_deref(), Some("3D"));
    }

    #[test]
    fn parses_prefixed_luid_from_memory_counter() {
        let name = CounterName::parse("pid_18044_luid_0x00000000_0x0000D1A3_phys_1");
        assert_eq!(name.pid, Some(18044));
        assert_eq!(name.luid, Some(Luid { high: 0, low: 0xd1a3 }));
        assert_eq!(name.phys, Some(1));
        assert_eq!(name.engine_index, None);
        assert_eq!(name.engine_type, None);
    }

    #[test]
    fn field_order_does_not_matter() {
        let a = CounterName::parse("engtype_Copy_eng_2_phys_0_pid_7");
        let b = CounterName::parse("pid_7_phys_0_eng_2_engtype_Copy");
        assert_eq!(a, b);
    }

    #[test]
    fn garbage_yields_empty_record() {
        assert_eq!(CounterName::parse(""), CounterName::default());
        assert_eq!(CounterName::parse("_Total"), CounterName::default());
        assert_eq!(CounterName::parse("chrome#2"), CounterName::default());
    }

    #[test]
    fn malformed_values_are_dropped_individually() {
        let name = CounterName::parse("pid_abc_luid_zz_01_phys_2_eng_");
        assert_eq!(name.pid, None);
        assert_eq!(name.luid, None);
        assert_eq!(name.phys, Some(2));
        assert_eq!(name.engine_index, None);
    }

    #[test]
    fn truncated_name_does_not_panic() {
        let name = CounterName::parse("pid_12_luid_0x1");
        assert_eq!(name.pid, Some(12));
        assert_eq!(name.luid, None);

        let name = CounterName::parse("engtype");
        assert_eq!(name.engine_type, None);
    }

    #[test]
    fn display_matches_segments() {
        let name = CounterName {
            pid: Some(5),
            luid: Some(Luid { high: 0, low: 0xabc }),
            phys: Some(0),
            engine_index: None,
            engine_type: None,
        };
        assert_eq!(name.to_string(), "pid_5_luid_0x00000000_0x00000abc_phys_0");
    }
}
