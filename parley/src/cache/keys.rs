//! Cache key templates. Keys are namespaced under `parley:` and built by
//! positional substitution; listing/search keys are composite so each
//! (user, page, size) combination caches independently.

/// Ordered turn sequence for a conversation.
pub fn conversation_turns(conversation_id: &str) -> String {
    format!("parley:conv:{conversation_id}:turns")
}

/// Paginated conversation listing for a user.
pub fn user_conversations_page(user_id: &str, page: u32, page_size: u32) -> String {
    format!("parley:user:{user_id}:convs:p{page}:s{page_size}")
}

/// Paginated conversation search for a user.
pub fn user_conversation_search(user_id: &str, term: &str, page: u32, page_size: u32) -> String {
    format!("parley:user:{user_id}:convsearch:{term}:p{page}:s{page_size}")
}

/// Secondary index: the set of listing/search keys currently live for a user.
/// The distributed cache has no wildcard delete, so invalidation enumerates
/// this set for point deletes; entry TTLs remain the backstop.
pub fn user_listing_index(user_id: &str) -> String {
    format!("parley:user:{user_id}:listing-keys")
}
