//! Stateless arithmetic challenge.
//!
//! Nothing about a challenge is stored except its id: every answer button
//! carries `sign(secret, challenge_id, offset)`, with offset 0 reserved for
//! the correct answer, so verification only needs the secret and the id.

use std::collections::HashSet;

use hmac::{Hmac, Mac};
use md5::Md5;
use rand::Rng;
use rand::seq::SliceRandom;
use topicgram_types::{Chat, InlineKeyboardButton, InlineKeyboardMarkup, User};
use tracing::debug;

type HmacMd5 = Hmac<Md5>;

/// Answer buttons per challenge, correct one included.
pub const OPTION_COUNT: usize = 4;

fn mac(secret: &str, challenge_id: u64, value: u64) -> HmacMd5 {
    let mut mac = HmacMd5::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(&challenge_id.to_le_bytes());
    mac.update(&value.to_le_bytes());
    mac
}

/// Hex payload of the answer button carrying `value`.
pub fn sign(secret: &str, challenge_id: u64, value: u64) -> String {
    hex::encode(mac(secret, challenge_id, value).finalize().into_bytes())
}

/// Constant-time check that `payload` is the correct-answer signature.
pub fn verify(secret: &str, challenge_id: u64, payload: &str) -> bool {
    let Ok(tag) = hex::decode(payload) else {
        return false;
    };
    mac(secret, challenge_id, 0).verify_slice(&tag).is_ok()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerOption {
    pub label: String,
    pub payload: String,
}

#[derive(Debug, Clone)]
pub struct Challenge {
    /// e.g. "37 + 12 = ?"
    pub problem: String,
    /// Shuffled; exactly one carries the correct payload.
    pub options: Vec<AnswerOption>,
}

impl Challenge {
    pub fn keyboard(&self) -> InlineKeyboardMarkup {
        InlineKeyboardMarkup::single_row(
            self.options
                .iter()
                .map(|o| InlineKeyboardButton {
                    text: o.label.clone(),
                    callback_data: o.payload.clone(),
                })
                .collect(),
        )
    }
}

pub fn new_challenge_id() -> u64 {
    // 0 means "no challenge outstanding"
    loop {
        let id: u64 = rand::rng().random();
        if id != 0 {
            return id;
        }
    }
}

pub fn issue(secret: &str, challenge_id: u64) -> Challenge {
    let mut rng = rand::rng();

    let add = rng.random_bool(0.5);
    let mut a: u64 = rng.random_range(0..100);
    let mut b: u64 = rng.random_range(0..100);
    if a < b {
        std::mem::swap(&mut a, &mut b);
    }

    let (problem, answer) = if add {
        (format!("{} + {} = ?", a, b), a + b)
    } else {
        (format!("{} - {} = ?", a, b), a - b)
    };

    let mut labels = HashSet::from([answer]);
    let mut offsets = HashSet::from([0u64]);
    let mut options = vec![AnswerOption {
        label: answer.to_string(),
        payload: sign(secret, challenge_id, 0),
    }];

    while options.len() < OPTION_COUNT {
        let label = rng.random_range(0..answer + 100);
        if !labels.insert(label) {
            continue;
        }

        let offset = loop {
            let offset: u64 = rng.random();
            if offsets.insert(offset) {
                break offset;
            }
        };

        options.push(AnswerOption {
            label: label.to_string(),
            payload: sign(secret, challenge_id, offset),
        });
    }

    options.shuffle(&mut rng);
    Challenge { problem, options }
}

/// Which accounts skip the challenge.
#[derive(Debug, Clone)]
pub struct CaptchaPolicy {
    pub premium_bypass: bool,
    /// Accounts with an id at or below this skip the challenge.
    pub legacy_user_id: Option<i64>,
    /// Accounts exposing more than one public handle skip the challenge.
    pub multi_handle_bypass: bool,
}

impl Default for CaptchaPolicy {
    fn default() -> Self {
        Self {
            premium_bypass: true,
            legacy_user_id: Some(1_000_000_000),
            multi_handle_bypass: true,
        }
    }
}

impl CaptchaPolicy {
    /// Bypass decided from the account alone, without a profile lookup.
    pub fn account_bypass(&self, user: &User) -> bool {
        if self.premium_bypass && user.is_premium {
            debug!("User {} is premium, skipping challenge", user.id);
            return true;
        }
        if self.legacy_user_id.is_some_and(|cutoff| user.id <= cutoff) {
            debug!("User {} is a legacy account, skipping challenge", user.id);
            return true;
        }
        false
    }

    /// Whether a profile lookup could still produce a bypass.
    pub fn wants_profile(&self) -> bool {
        self.multi_handle_bypass
    }

    pub fn should_challenge(&self, user: &User, profile: Option<&Chat>) -> bool {
        if self.account_bypass(user) {
            return false;
        }
        if let Some(chat) = profile.filter(|_| self.multi_handle_bypass) {
            if chat.active_username_count() > 1 {
                debug!("User {} has {} public handles, skipping challenge", user.id, chat.active_username_count());
                return false;
            }
        }
        true
    }
}
