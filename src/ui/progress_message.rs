#[derive(Clone, Debug, PartialEq)]
pub enum ProgressMessage {
    Started {
        total: usize,
    },
    Progress {
        current: usize,
        total: usize,
    },
    Finished,
    Error(String),
}
