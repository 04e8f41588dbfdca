//! User ID formatting and network lookup

/// Build a user ID of the form `name (comment) <email>`.
///
/// The comment and e-mail segments are left out when absent.
pub fn format_user_id(name: &str, email: Option<&str>, comment: Option<&str>) -> String {
    let mut user_id = String::from(name);

    if let Some(comment) = comment {
        user_id.push_str(" (");
        user_id.push_str(comment);
        user_id.push(')');
    }

    if let Some(email) = email {
        user_id.push_str(" <");
        user_id.push_str(email);
        user_id.push('>');
    }

    user_id
}

/// E-mail address carried by a user ID.
///
/// Takes the text between `<` and `>` when present; a bare user ID is
/// treated as an address itself. Returns `None` if the candidate has no `@`.
pub fn email_of(user_id: &str) -> Option<&str> {
    let candidate = match (user_id.rfind('<'), user_id.rfind('>')) {
        (Some(open), Some(close)) if open < close => &user_id[open + 1..close],
        _ => user_id.trim(),
    };

    candidate.contains('@').then_some(candidate)
}

/// Whether the user ID's e-mail domain is `network` (ASCII case-insensitive).
pub fn user_id_matches_network(user_id: &str, network: &str) -> bool {
    email_of(user_id)
        .and_then(|email| email.rsplit_once('@'))
        .is_some_and(|(_, domain)| !domain.is_empty() && domain.eq_ignore_ascii_case(network))
}

/// First of `user_ids` that belongs to `network`.
///
/// Pass the user IDs in keyring order; see
/// [`crate::SigningKeyPair::user_ids`].
pub fn lookup_user_id<'a, I>(user_ids: I, network: &str) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    user_ids.into_iter().find(|user_id| user_id_matches_network(user_id, network))
}
