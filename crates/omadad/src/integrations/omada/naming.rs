/// Site name the controller uses when none was configured
pub const DEFAULT_SITE: &str = "Default";

/// What the default site is shown as
const DEFAULT_SITE_DISPLAY: &str = "Omada";

/// Display name for an object on a site: `"{Site} {Name}"`, both title-cased.
pub fn display_name(site: &str, name: &str) -> String {
    let site = if site == DEFAULT_SITE {
        DEFAULT_SITE_DISPLAY
    } else {
        site
    };
    format!("{} {}", title_case(site), title_case(name))
}

/// Title-case every word, where a word is a run of cased letters.
///
/// A cased letter following an uncased character is uppercased, every other
/// cased letter is lowercased: "router1" becomes "Router1", "ab1cd" becomes
/// "Ab1Cd". Uncased letters such as CJK ideographs are copied as-is and end
/// the word, so "中a" becomes "中A".
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_is_cased = false;
    for c in s.chars() {
        if prev_is_cased {
            out.extend(c.to_lowercase());
        } else {
            out.extend(c.to_uppercase());
        }
        prev_is_cased = c.is_lowercase() || c.is_uppercase();
    }
    out
}
