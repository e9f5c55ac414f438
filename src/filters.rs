//! Canonical photometric filter names.

pub static FILTERS: &[&str] = &["up", "gp", "rp", "ip", "zp", "B", "V", "Y", "J", "H", "K"];

pub fn is_canonical(name: &str) -> bool {
    FILTERS.contains(&name)
}
