use std::cell::RefCell;

use string_interner::{symbol::SymbolU32, DefaultBackend, DefaultHashBuilder};

/// Default string interner
pub type StringInterner<B = DefaultBackend<StrId>, H = DefaultHashBuilder> =
    string_interner::StringInterner<StrId, B, H>;

/// Id of an interned string. Two ids are equal if and only if the
/// strings they were interned from are byte-for-byte equal.
pub type StrId = SymbolU32;

thread_local! {
    static POOL: RefCell<StringInterner> = RefCell::new(StringInterner::default());
}

/// Intern a string, returning the id shared by every equal string that
/// was or will be interned on this thread.
pub fn sym<S: AsRef<str>>(s: S) -> StrId {
    POOL.with(|pool| pool.borrow_mut().get_or_intern(s))
}

/// Resolve an id back to the contents it was interned from.
pub fn resolve(id: StrId) -> String {
    POOL.with(|pool| {
        pool.borrow()
            .resolve(id)
            .expect("string interned prior to access")
            .to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_contents_share_one_id() {
        assert_eq!(sym("twine"), sym("twine"));
        assert_eq!(sym(String::from("twine")), sym("twine"));
    }

    #[test]
    fn distinct_contents_get_distinct_ids() {
        assert_ne!(sym("left"), sym("right"));
        assert_ne!(sym(""), sym(" "));
    }

    #[test]
    fn resolving_round_trips() {
        let id = sym("vesper");
        assert_eq!(resolve(id), "vesper");
    }
}
