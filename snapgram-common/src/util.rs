/// Splits a comma-separated tag field into tags.
///
/// All spaces are removed before splitting and empty segments are dropped, so
/// `"art, travel,,"` yields `["art", "travel"]`.
#[must_use]
pub fn parse_tags(raw: &str) -> Vec<String> {
    raw.replace(' ', "")
        .split(',')
        .filter(|tag| !tag.is_empty())
        .map(str::to_owned)
        .collect()
}

#[must_use]
pub fn join_tags(tags: &[String]) -> String {
    tags.join(",")
}

/// Loose `local@domain.tld` shape check; the backend does the real validation.
#[must_use]
pub fn looks_like_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    !local.is_empty()
        && !email.chars().any(char::is_whitespace)
        && domain
            .rsplit_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty() && !host.contains('@'))
}
