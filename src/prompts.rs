//! Fixed bot wording shown in the transcript
//!
//! None of these ever reach the backend as conversation turns.

pub const GREETING: [&str; 2] = ["Hello there 👋", "How can I help you today?"];

pub const SUBTYPE_PROMPT: &str = "Is this for a Private Tenancy or a Local Authority Tenancy?";

pub const DESCRIBE_PROMPT: &str =
    "Please briefly describe your situation so I can find the most suitable letter template.";

pub const TEMPLATE_SELECTED: &str = "Perfect. I’ve selected the right letter for your case.";

pub const TRANSPORT_FAILURE: &str = "Something went wrong. Please try again later.";

pub const REQUEST_CANCELLED: &str = "Request cancelled.";

pub const LETTER_GENERATING: &str = "Thanks, I have what I need. Generating your letter now…";

pub const LETTER_READY: &str = "Your letter is ready to download.";

pub const LETTER_FAILED: &str =
    "Letter generation failed. You can keep answering, or ask for the letter again.";

pub const LETTER_CANCELLED: &str = "Letter generation cancelled. You can ask for the letter again.";
