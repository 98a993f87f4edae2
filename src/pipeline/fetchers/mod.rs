pub mod intercom;
pub mod posthog;
pub mod sentry;
pub mod stripe;
pub mod vercel;
