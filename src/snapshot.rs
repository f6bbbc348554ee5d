/// A local snapshot, as reported by the Dataset Driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub filesystem: String,
    pub name: String,
    pub referenced: u64,
    pub used: u64,
}

impl Snapshot {
    /// `<filesystem>@<name>`, the identifier the dataset tool uses.
    pub fn key(&self) -> String {
        format!("{}@{}", self.filesystem, self.name)
    }
}
