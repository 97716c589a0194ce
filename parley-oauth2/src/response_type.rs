use std::fmt;

use crate::error::OAuth2Error;

/// The facets of a requested `response_type`.
///
/// Only two shapes are legal: `none` on its own, or any non-empty
/// combination of `code`, `token` and `id_token`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResponseType {
    pub code: bool,
    pub token: bool,
    pub id_token: bool,
    pub none: bool,
}

impl ResponseType {
    /// The eight legal values, as advertised in discovery.
    pub const SUPPORTED: [&'static str; 8] = [
        "code",
        "token",
        "id_token",
        "code token",
        "code id_token",
        "token id_token",
        "code token id_token",
        "none",
    ];

    pub fn is_valid(&self) -> bool {
        let any = self.code || self.token || self.id_token;
        (self.none && !any) || (!self.none && any)
    }

    /// Parse a space-separated `response_type` value.
    ///
    /// Unknown or repeated tokens are `unsupported_response_type`, as is
    /// any combination that fails [`is_valid`](Self::is_valid).
    pub fn parse(raw: &str) -> Result<Self, OAuth2Error> {
        let mut rt = ResponseType::default();
        for part in raw.split(' ').filter(|s| !s.is_empty()) {
            let facet = match part {
                "code" => &mut rt.code,
                "token" => &mut rt.token,
                "id_token" => &mut rt.id_token,
                "none" => &mut rt.none,
                other => {
                    return Err(OAuth2Error::UnsupportedResponseType(format!(
                        "unknown response_type '{other}'"
                    )))
                }
            };
            if *facet {
                return Err(OAuth2Error::UnsupportedResponseType(format!(
                    "response_type '{part}' is repeated"
                )));
            }
            *facet = true;
        }
        if !rt.is_valid() {
            return Err(OAuth2Error::UnsupportedResponseType(format!(
                "response_type '{raw}' is not a valid combination"
            )));
        }
        Ok(rt)
    }

    /// Whether the response is delivered in the URI fragment rather than the query.
    pub fn uses_fragment(&self) -> bool {
        self.token || self.id_token
    }
}

impl fmt::Display for ResponseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts = [
            (self.code, "code"),
            (self.token, "token"),
            (self.id_token, "id_token"),
            (self.none, "none"),
        ];
        let joined: Vec<&str> = parts
            .iter()
            .filter(|(on, _)| *on)
            .map(|(_, name)| *name)
            .collect();
        f.write_str(&joined.join(" "))
    }
}
