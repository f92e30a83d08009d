//! Application constants

/// YouTube Data API page-size ceiling; a single scan never pulls more than this
pub const YOUTUBE_PAGE_SIZE: i64 = 50;

/// Maximum video ids per metadata lookup request (YouTube API limit)
pub const METADATA_BATCH_SIZE: usize = 50;

/// Pause between sequential transcript fetches (upstream rate limit)
pub const TRANSCRIPT_FETCH_DELAY_MS: u64 = 100;

/// Pause after each video's classification (classifier API rate limit)
pub const ANALYSIS_DELAY_MS: u64 = 200;

/// Default number of unanalyzed videos per analyze call
pub const DEFAULT_ANALYZE_LIMIT: i64 = 10;

/// Description prefix sent to the classifier
pub const DESCRIPTION_EXCERPT_CHARS: usize = 500;

/// Transcript prefix sent to the classifier
pub const TRANSCRIPT_EXCERPT_CHARS: usize = 4000;

/// Fallback access-token lifetime when the OAuth provider omits expires_in
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 3600;

/// OAuth CSRF state rows are valid for this many minutes
pub const OAUTH_STATE_TTL_MINUTES: i64 = 10;
