/// Database row types — these map directly to SQLite rows.
/// Distinct from the wire model in topicgram-types to keep the DB layer independent.

/// Human-verification progress of a user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Verification {
    #[default]
    NotSent,
    Pending,
    Completed,
}

impl Verification {
    pub fn as_i64(self) -> i64 {
        match self {
            Self::NotSent => 0,
            Self::Pending => 1,
            Self::Completed => 2,
        }
    }

    pub fn from_i64(value: i64) -> Self {
        match value {
            1 => Self::Pending,
            2 => Self::Completed,
            _ => Self::NotSent,
        }
    }
}

/// Directory row: one per user known to the relay.
///
/// `id == 0` means the row has not been persisted yet. `thread_id == 0` means
/// the user has no open topic. `challenge_id` and `challenge_sent` are
/// non-zero exactly while `verification` is `Pending`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Topic {
    pub id: i64,
    pub user_id: i64,
    pub thread_id: i32,
    pub is_banned: bool,
    pub verification: Verification,
    pub challenge_id: u64,
    /// Unix seconds of the last challenge issuance.
    pub challenge_sent: i64,
    pub language_code: String,
}

impl Topic {
    /// Unsaved row for a user seen for the first time.
    pub fn new(user_id: i64) -> Self {
        Self {
            user_id,
            ..Self::default()
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.id != 0
    }

    pub fn has_thread(&self) -> bool {
        self.thread_id != 0
    }

    pub fn clear_challenge(&mut self) {
        self.challenge_id = 0;
        self.challenge_sent = 0;
    }

    /// Moves the row into `Pending` for a freshly issued challenge.
    pub fn begin_challenge(&mut self, challenge_id: u64, sent_at: i64) {
        self.verification = Verification::Pending;
        self.challenge_id = challenge_id;
        self.challenge_sent = sent_at;
    }
}

/// One relayed message: the same content seen from both sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageLink {
    /// Owning directory row id (not the platform thread id).
    pub topic_id: i64,
    pub user_msg_id: i32,
    pub topic_msg_id: i32,
}

impl MessageLink {
    pub fn new(topic_id: i64, user_msg_id: i32, topic_msg_id: i32) -> Self {
        Self {
            topic_id,
            user_msg_id,
            topic_msg_id,
        }
    }
}
