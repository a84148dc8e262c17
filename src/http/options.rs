//! Request-processing option flags
//!
//! Mirrors the bitflag pattern already used by `http::h2::frames::FrameFlags`:
//! a thin newtype over an integer with `const` masks and `is_set`/`set`
//! accessors, rather than pulling in a dedicated bitflags crate.

/// Bitfield controlling which parts of a request the engine parses
/// automatically before invoking the user handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerOptions(u32);

impl ServerOptions {
    pub const PARSE_URL: u32 = 1 << 0;
    pub const PARSE_QUERY_STRING: u32 = 1 << 1;
    pub const PARSE_FORM_BODY: u32 = 1 << 2;
    pub const PARSE_JSON_BODY: u32 = 1 << 3;
    pub const PARSE_MULTIPART_BODY: u32 = 1 << 4;
    pub const PARSE_COOKIES: u32 = 1 << 5;
    pub const DISTRIBUTE: u32 = 1 << 6;
    pub const ERROR_STACK_TRACES: u32 = 1 << 7;
    pub const DISABLE_HTTP2: u32 = 1 << 8;
    pub const ENABLE_PUSH_REQUESTS: u32 = 1 << 9;

    /// Empty flag set
    pub fn empty() -> Self {
        ServerOptions(0)
    }

    /// Raw bits
    pub fn bits(&self) -> u32 {
        self.0
    }

    /// Construct from raw bits
    pub fn from_bits(bits: u32) -> Self {
        ServerOptions(bits)
    }

    /// Set a flag (builder-style)
    pub fn with(mut self, flag: u32) -> Self {
        self.0 |= flag;
        self
    }

    /// Clear a flag (builder-style)
    pub fn without(mut self, flag: u32) -> Self {
        self.0 &= !flag;
        self
    }

    /// Check whether a flag is set
    pub fn is_set(&self, flag: u32) -> bool {
        (self.0 & flag) != 0
    }
}

impl Default for ServerOptions {
    /// `parseURL`, `parseQueryString`, `parseFormBody`, `parseJsonBody`,
    /// `parseMultiPartBody`, `parseCookies` and `errorStackTraces` are on by
    /// default; `distribute`, `disableHTTP2` and `enablePushRequests` are
    /// off.
    fn default() -> Self {
        ServerOptions(
            Self::PARSE_URL
                | Self::PARSE_QUERY_STRING
                | Self::PARSE_FORM_BODY
                | Self::PARSE_JSON_BODY
                | Self::PARSE_MULTIPART_BODY
                | Self::PARSE_COOKIES
                | Self::ERROR_STACK_TRACES,
        )
    }
}

/// Bitfield controlling session cookie emission overrides
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions(u32);

impl SessionOptions {
    pub const HTTP_ONLY: u32 = 1 << 0;
    pub const SECURE: u32 = 1 << 1;
    pub const NO_SECURE: u32 = 1 << 2;

    pub fn empty() -> Self {
        SessionOptions(0)
    }

    pub fn from_bits(bits: u32) -> Self {
        SessionOptions(bits)
    }

    pub fn with(mut self, flag: u32) -> Self {
        self.0 |= flag;
        self
    }

    pub fn is_set(&self, flag: u32) -> bool {
        (self.0 & flag) != 0
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        SessionOptions(Self::HTTP_ONLY)
    }
}
