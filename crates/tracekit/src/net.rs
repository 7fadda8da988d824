//! Request helpers for framework middleware.

/// Extracts the client IP from request headers.
///
/// Checks `X-Forwarded-For` (first entry), then `X-Real-IP`, header names
/// matched case-insensitively, and falls back to `remote_addr`.
pub fn client_ip<'a, I>(headers: I, remote_addr: Option<&'a str>) -> Option<String>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut forwarded_for = None;
    let mut real_ip = None;

    for (name, value) in headers {
        if name.eq_ignore_ascii_case("x-forwarded-for") {
            forwarded_for = Some(value);
        } else if name.eq_ignore_ascii_case("x-real-ip") {
            real_ip = Some(value);
        }
    }

    if let Some(first) = forwarded_for
        .and_then(|list| list.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
    {
        return Some(first.to_string());
    }

    if let Some(ip) = real_ip.map(str::trim).filter(|ip| !ip.is_empty()) {
        return Some(ip.to_string());
    }

    remote_addr.map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forwarded_for_takes_first_hop() {
        let headers = [("X-Forwarded-For", "203.0.113.1, 198.51.100.1")];
        assert_eq!(client_ip(headers, Some("10.0.0.1")).as_deref(), Some("203.0.113.1"));
    }

    #[test]
    fn real_ip_is_second_choice() {
        let headers = [("x-real-ip", " 203.0.113.7 ")];
        assert_eq!(client_ip(headers, None).as_deref(), Some("203.0.113.7"));
    }

    #[test]
    fn falls_back_to_remote_addr() {
        assert_eq!(client_ip([], Some("198.51.100.1")).as_deref(), Some("198.51.100.1"));
        assert_eq!(client_ip([], None), None);
    }
}
