//! Composition of the system message sent with every request.

/// Who the assistant is talking to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserProfile {
    /// Name the user goes by.
    pub name: String,
    /// Free-form description of the user.
    pub description: String,
}

impl UserProfile {
    /// Creates a profile.
    #[inline]
    pub fn new<N: Into<String>, D: Into<String>>(name: N, description: D) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Joins the base prompt, the numbered chat rules and the user profile.
///
/// Returns `None` when there is nothing to send.
pub(crate) fn compose_system_prompt(
    base: Option<&str>,
    rules: &[String],
    profile: Option<&UserProfile>,
) -> Option<String> {
    if base.is_none() && rules.is_empty() && profile.is_none() {
        return None;
    }

    let mut prompt = base.unwrap_or_default().to_owned();
    if !rules.is_empty() {
        prompt.push_str("\n\nChat rules\nFollow these rules strictly:\n");
        for (idx, rule) in rules.iter().enumerate() {
            prompt.push_str(&format!("{}. {rule}\n", idx + 1));
        }
    }
    if let Some(profile) = profile {
        prompt.push_str(&format!(
            "\n\nUser profile\nYou are talking to: {}\nDescription: {}\n\
             Tailor your replies to this user.",
            profile.name, profile.description
        ));
    }
    Some(prompt)
}
