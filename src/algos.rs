mod age;
mod self_likes;

pub use age::{exceeds_age, is_older_than, parse_timestamp};
pub use self_likes::{find_self_liked_posts, self_like_records, SubjectCheck};

#[cfg(test)]
pub(crate) use self_likes::fakes;
