//! User and group records kept in keyed stores.
//!
//! Both records validate on construction and on deserialization, so a
//! `User` or `Group` value that exists is always well-formed. Validation
//! failures are [`StorageError::InvalidContent`].
//!
//! # Example
//!
//! ```
//! use mooover_common_storage::{Identifiable, User};
//!
//! let user = User::builder()
//!     .sub("auth0|123")
//!     .name("Ada Lovelace")
//!     .given_name("Ada")
//!     .family_name("Lovelace")
//!     .nickname("ada")
//!     .email("ada@example.com")
//!     .picture("https://example.com/ada.png")
//!     .build()?;
//!
//! assert_eq!(user.id(), "auth0|123");
//! assert_eq!(user.daily_steps_goal, 5000);
//! # Ok::<(), mooover_common_storage::StorageError>(())
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    entity::Identifiable,
    error::{StorageError, StorageResult},
};

/// Default daily step goal for new users and groups.
pub const DEFAULT_DAILY_STEPS_GOAL: i64 = 5_000;

/// Default weekly step goal for new users and groups.
pub const DEFAULT_WEEKLY_STEPS_GOAL: i64 = 35_000;

/// Default application theme for new users.
pub const DEFAULT_APP_THEME: &str = "light";

fn default_app_theme() -> String {
    DEFAULT_APP_THEME.to_owned()
}

/// Decoded goals fall back to `default` when absent, null, or zero.
fn goal_or(goal: Option<i64>, default: i64) -> i64 {
    goal.filter(|goal| *goal != 0).unwrap_or(default)
}

/// Step counters shared by users and groups.
///
/// Counts may be zero; goals must be positive.
fn validate_steps(
    today_steps: i64,
    daily_steps_goal: i64,
    this_week_steps: i64,
    weekly_steps_goal: i64,
) -> Result<(), &'static str> {
    if today_steps < 0 {
        return Err("today_steps must not be negative");
    }
    if daily_steps_goal <= 0 {
        return Err("daily_steps_goal must be positive");
    }
    if this_week_steps < 0 {
        return Err("this_week_steps must not be negative");
    }
    if weekly_steps_goal <= 0 {
        return Err("weekly_steps_goal must be positive");
    }
    Ok(())
}

/// Returns `true` if `text` contains an emoji code point.
fn contains_emoji(text: &str) -> bool {
    text.chars().any(|c| {
        matches!(
            u32::from(c),
            0x1F000..=0x1FAFF // symbols, pictographs, emoticons, flags
                | 0x2600..=0x27BF // miscellaneous symbols and dingbats
                | 0x2B00..=0x2BFF // arrows and stars (⭐, ⬆)
                | 0xFE0F // emoji presentation selector
        )
    })
}

/// An application user, keyed by the identity provider's `sub` claim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "UserData")]
pub struct User {
    /// Subject identifier from the identity provider.
    pub sub: String,
    /// Full display name.
    pub name: String,
    /// Given (first) name.
    pub given_name: String,
    /// Family (last) name.
    pub family_name: String,
    /// Nickname shown in the app.
    pub nickname: String,
    /// Contact email address.
    pub email: String,
    /// Avatar URL.
    pub picture: String,
    /// Steps counted today.
    pub today_steps: i64,
    /// Daily step goal.
    pub daily_steps_goal: i64,
    /// Steps counted this week.
    pub this_week_steps: i64,
    /// Weekly step goal.
    pub weekly_steps_goal: i64,
    /// UI theme name.
    pub app_theme: String,
}

#[bon::bon]
impl User {
    /// Creates a validated user.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidContent`] if a required string is
    /// empty, a step count is negative, or a goal is not positive.
    #[builder]
    pub fn new(
        #[builder(into)] sub: String,
        #[builder(into)] name: String,
        #[builder(into)] given_name: String,
        #[builder(into)] family_name: String,
        #[builder(into)] nickname: String,
        #[builder(into)] email: String,
        #[builder(into)] picture: String,
        #[builder(default)] today_steps: i64,
        #[builder(default = DEFAULT_DAILY_STEPS_GOAL)] daily_steps_goal: i64,
        #[builder(default)] this_week_steps: i64,
        #[builder(default = DEFAULT_WEEKLY_STEPS_GOAL)] weekly_steps_goal: i64,
        #[builder(into, default = default_app_theme())] app_theme: String,
    ) -> StorageResult<Self> {
        let user = Self {
            sub,
            name,
            given_name,
            family_name,
            nickname,
            email,
            picture,
            today_steps,
            daily_steps_goal,
            this_week_steps,
            weekly_steps_goal,
            app_theme,
        };
        user.validate()?;
        Ok(user)
    }
}

impl User {
    /// Checks every field constraint.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidContent`] naming the first violation.
    pub fn validate(&self) -> StorageResult<()> {
        let required = [
            ("sub", &self.sub),
            ("name", &self.name),
            ("given_name", &self.given_name),
            ("family_name", &self.family_name),
            ("nickname", &self.nickname),
            ("email", &self.email),
            ("picture", &self.picture),
            ("app_theme", &self.app_theme),
        ];
        if let Some((field, _)) = required.iter().find(|(_, value)| value.is_empty()) {
            return Err(StorageError::invalid_content(format!("invalid user data: {field} is empty")));
        }

        validate_steps(
            self.today_steps,
            self.daily_steps_goal,
            self.this_week_steps,
            self.weekly_steps_goal,
        )
        .map_err(|reason| StorageError::invalid_content(format!("invalid user data: {reason}")))
    }

    /// Decodes and validates a user from a JSON value.
    ///
    /// Optional fields that are missing, null, zero, or empty take their
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidContent`] if a required field is
    /// missing or any constraint fails.
    pub fn from_value(value: serde_json::Value) -> StorageResult<Self> {
        serde_json::from_value(value)
            .map_err(|e| StorageError::invalid_content_with_source("invalid user data", e))
    }

    /// Encodes this user as a JSON object.
    #[must_use]
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "sub": self.sub,
            "name": self.name,
            "given_name": self.given_name,
            "family_name": self.family_name,
            "nickname": self.nickname,
            "email": self.email,
            "picture": self.picture,
            "today_steps": self.today_steps,
            "daily_steps_goal": self.daily_steps_goal,
            "this_week_steps": self.this_week_steps,
            "weekly_steps_goal": self.weekly_steps_goal,
            "app_theme": self.app_theme,
        })
    }
}

impl Identifiable for User {
    type Id = String;

    fn id(&self) -> &String {
        &self.sub
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{sub: '{}', name: '{}', given_name: '{}', family_name: '{}', nickname: '{}', \
             email: '{}', picture: '{}', today_steps: {}, daily_steps_goal: {}, \
             this_week_steps: {}, weekly_steps_goal: {}, app_theme: '{}'}}",
            self.sub,
            self.name,
            self.given_name,
            self.family_name,
            self.nickname,
            self.email,
            self.picture,
            self.today_steps,
            self.daily_steps_goal,
            self.this_week_steps,
            self.weekly_steps_goal,
            self.app_theme,
        )
    }
}

/// Wire shape of [`User`]; validated on conversion.
#[derive(Deserialize)]
struct UserData {
    sub: String,
    name: String,
    given_name: String,
    family_name: String,
    nickname: String,
    email: String,
    picture: String,
    #[serde(default)]
    today_steps: Option<i64>,
    #[serde(default)]
    daily_steps_goal: Option<i64>,
    #[serde(default)]
    this_week_steps: Option<i64>,
    #[serde(default)]
    weekly_steps_goal: Option<i64>,
    #[serde(default)]
    app_theme: Option<String>,
}

impl TryFrom<UserData> for User {
    type Error = StorageError;

    fn try_from(data: UserData) -> StorageResult<Self> {
        let user = User {
            sub: data.sub,
            name: data.name,
            given_name: data.given_name,
            family_name: data.family_name,
            nickname: data.nickname,
            email: data.email,
            picture: data.picture,
            today_steps: data.today_steps.unwrap_or_default(),
            daily_steps_goal: goal_or(data.daily_steps_goal, DEFAULT_DAILY_STEPS_GOAL),
            this_week_steps: data.this_week_steps.unwrap_or_default(),
            weekly_steps_goal: goal_or(data.weekly_steps_goal, DEFAULT_WEEKLY_STEPS_GOAL),
            app_theme: data
                .app_theme
                .filter(|theme| !theme.is_empty())
                .unwrap_or_else(default_app_theme),
        };
        user.validate()?;
        Ok(user)
    }
}

/// A walking group, keyed by its nickname.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "GroupData")]
pub struct Group {
    /// Unique group handle.
    pub nickname: String,
    /// Display name.
    pub name: String,
    /// Steps counted today across members.
    pub today_steps: i64,
    /// Daily step goal.
    pub daily_steps_goal: i64,
    /// Steps counted this week across members.
    pub this_week_steps: i64,
    /// Weekly step goal.
    pub weekly_steps_goal: i64,
}

#[bon::bon]
impl Group {
    /// Creates a validated group.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidContent`] if the nickname or name is
    /// empty or contains emoji, a step count is negative, or a goal is not
    /// positive.
    #[builder]
    pub fn new(
        #[builder(into)] nickname: String,
        #[builder(into)] name: String,
        #[builder(default)] today_steps: i64,
        #[builder(default = DEFAULT_DAILY_STEPS_GOAL)] daily_steps_goal: i64,
        #[builder(default)] this_week_steps: i64,
        #[builder(default = DEFAULT_WEEKLY_STEPS_GOAL)] weekly_steps_goal: i64,
    ) -> StorageResult<Self> {
        let group =
            Self { nickname, name, today_steps, daily_steps_goal, this_week_steps, weekly_steps_goal };
        group.validate()?;
        Ok(group)
    }
}

impl Group {
    /// Checks every field constraint.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidContent`] naming the first violation.
    pub fn validate(&self) -> StorageResult<()> {
        for (field, value) in [("nickname", &self.nickname), ("name", &self.name)] {
            if value.is_empty() {
                return Err(StorageError::invalid_content(format!(
                    "invalid group data: {field} is empty"
                )));
            }
            if contains_emoji(value) {
                return Err(StorageError::invalid_content(format!(
                    "invalid group data: {field} contains emoji"
                )));
            }
        }

        validate_steps(
            self.today_steps,
            self.daily_steps_goal,
            self.this_week_steps,
            self.weekly_steps_goal,
        )
        .map_err(|reason| StorageError::invalid_content(format!("invalid group data: {reason}")))
    }

    /// Decodes and validates a group from a JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidContent`] if a required field is
    /// missing or any constraint fails.
    pub fn from_value(value: serde_json::Value) -> StorageResult<Self> {
        serde_json::from_value(value)
            .map_err(|e| StorageError::invalid_content_with_source("invalid group data", e))
    }

    /// Encodes this group as a JSON object.
    #[must_use]
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "nickname": self.nickname,
            "name": self.name,
            "today_steps": self.today_steps,
            "daily_steps_goal": self.daily_steps_goal,
            "this_week_steps": self.this_week_steps,
            "weekly_steps_goal": self.weekly_steps_goal,
        })
    }
}

impl Identifiable for Group {
    type Id = String;

    fn id(&self) -> &String {
        &self.nickname
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{nickname: '{}', name: '{}', today_steps: {}, daily_steps_goal: {}, \
             this_week_steps: {}, weekly_steps_goal: {}}}",
            self.nickname,
            self.name,
            self.today_steps,
            self.daily_steps_goal,
            self.this_week_steps,
            self.weekly_steps_goal,
        )
    }
}

/// Wire shape of [`Group`]; validated on conversion.
#[derive(Deserialize)]
struct GroupData {
    nickname: String,
    name: String,
    #[serde(default)]
    today_steps: Option<i64>,
    #[serde(default)]
    daily_steps_goal: Option<i64>,
    #[serde(default)]
    this_week_steps: Option<i64>,
    #[serde(default)]
    weekly_steps_goal: Option<i64>,
}

impl TryFrom<GroupData> for Group {
    type Error = StorageError;

    fn try_from(data: GroupData) -> StorageResult<Self> {
        let group = Group {
            nickname: data.nickname,
            name: data.name,
            today_steps: data.today_steps.unwrap_or_default(),
            daily_steps_goal: goal_or(data.daily_steps_goal, DEFAULT_DAILY_STEPS_GOAL),
            this_week_steps: data.this_week_steps.unwrap_or_default(),
            weekly_steps_goal: goal_or(data.weekly_steps_goal, DEFAULT_WEEKLY_STEPS_GOAL),
        };
        group.validate()?;
        Ok(group)
    }
}
