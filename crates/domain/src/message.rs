use hickory_proto::op::{Message, ResponseCode};

/// TTL applied to locally constructed answers when none is given.
pub const DEFAULT_TTL: u32 = 86_400;

/// Longest character-string a TXT record can carry.
pub const MAX_CHARACTER_STRING: usize = 255;

/// Folds an upstream response into `target`.
///
/// AA is and-ed, RA and RD are or-ed, every section is appended, and the
/// upstream RCODE replaces ours unless it is NoError.
pub fn merge_message(target: &mut Message, mut upstream: Message) {
    target.set_authoritative(target.authoritative() && upstream.authoritative());
    target.set_recursion_available(
        target.recursion_available() || upstream.recursion_available(),
    );
    target.set_recursion_desired(target.recursion_desired() || upstream.recursion_desired());

    target.add_queries(upstream.take_queries());
    target.add_answers(upstream.take_answers());
    target.add_name_servers(upstream.take_name_servers());
    target.add_additionals(upstream.take_additionals());

    if upstream.response_code() != ResponseCode::NoError {
        target.set_response_code(upstream.response_code());
    }
}

/// Splits text into pieces of at most `size` bytes without breaking a character.
pub fn chunked(text: &str, size: usize) -> Vec<String> {
    let size = size.max(4);
    let mut chunks = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        if current.len() + ch.len_utf8() > size {
            chunks.push(std::mem::take(&mut current));
        }
        current.push(ch);
    }

    if !current.is_empty() || chunks.is_empty() {
        chunks.push(current);
    }
    chunks
}
