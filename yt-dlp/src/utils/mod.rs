//! Utility functions shared by the bridge modules.

pub mod file_system;

/// Converts a list of string-like arguments into owned strings, ready for an [`Executor`](crate::executor::Executor).
pub fn to_owned<I, S>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    args.into_iter().map(|arg| arg.as_ref().to_string()).collect()
}
