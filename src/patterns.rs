use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    pub static ref PACKAGE_NAME_PATTERN: Regex =
        Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9._-]*[A-Za-z0-9])?$").unwrap();
    pub static ref REQUIREMENT_HEAD_PATTERN: Regex =
        Regex::new(r"^(?P<name>[A-Za-z0-9][A-Za-z0-9._-]*)\s*(?:\[(?P<extras>[^\]]*)\])?\s*(?P<rest>.*)$").unwrap();
    pub static ref CONSTRAINT_PATTERN: Regex =
        Regex::new(r"^(?P<op>===|~=|==|!=|<=|>=|<|>)\s*(?P<version>\S+)$").unwrap();
    pub static ref VERSION_PATTERN: Regex =
        Regex::new(r"^[0-9A-Za-z!+_-]+(?:\.[0-9A-Za-z!+_-]+)*(?:\.\*)?$").unwrap();
    pub static ref INLINE_COMMENT_PATTERN: Regex = Regex::new(r"(^|\s+)#(?P<text>.*)$").unwrap();
    pub static ref HASH_PATTERN: Regex = Regex::new(r"^[A-Za-z0-9]+:[0-9A-Fa-f]+$").unwrap();
    pub static ref SNAPSHOT_NAME_PATTERN: Regex =
        Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").unwrap();
}
