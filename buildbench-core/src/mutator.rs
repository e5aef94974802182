//! Mutator Engine
//!
//! Applies a reversible edit to one source file before each warm-up and
//! measured invocation, so that incremental work is simulated without the
//! build tool short-circuiting on an up-to-date input.
//!
//! The edit is a pure function of the original bytes and the invocation
//! index: the file is always rewritten from the remembered original, two
//! indices produce two distinct contents, and reverting is a plain write of
//! the original bytes. `SourceMutator` is a scoped guard; dropping it
//! restores the file on every exit path, including unwinds.

use crate::scenario::{MutationKind, MutatorSpec};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Compute the mutated contents of a source file for one invocation.
pub fn mutate(kind: MutationKind, original: &[u8], index: usize) -> Vec<u8> {
    match kind {
        MutationKind::AbiJava => {
            let method = format!("\npublic void _changedForBuild{}() {{ }}", index);
            insert_before(original, last_byte(original, b'}'), method.as_bytes())
        }
        MutationKind::NonAbiJava => {
            let statement = format!("\nint _extra = {};", index);
            insert_before(original, last_method_close(original), statement.as_bytes())
        }
        MutationKind::AndroidResource => {
            let entry = format!(
                "    <string name=\"mutation_value{}\">mutation</string>\n",
                index
            );
            insert_before(original, find(original, b"</resources>"), entry.as_bytes())
        }
        MutationKind::AndroidResourceValue => {
            let suffix = format!(" mutated{}", index);
            insert_before(original, find(original, b"</string>"), suffix.as_bytes())
        }
    }
}

fn insert_before(original: &[u8], position: Option<usize>, text: &[u8]) -> Vec<u8> {
    let at = position.unwrap_or(original.len());
    let mut out = Vec::with_capacity(original.len() + text.len());
    out.extend_from_slice(&original[..at]);
    out.extend_from_slice(text);
    out.extend_from_slice(&original[at..]);
    out
}

fn last_byte(bytes: &[u8], needle: u8) -> Option<usize> {
    bytes.iter().rposition(|&b| b == needle)
}

/// Position of the `}` closing the last method body: the second-to-last
/// closing brace of the file (the last one closes the type).
fn last_method_close(bytes: &[u8]) -> Option<usize> {
    let class_close = last_byte(bytes, b'}')?;
    last_byte(&bytes[..class_close], b'}')
}

fn find(bytes: &[u8], needle: &[u8]) -> Option<usize> {
    bytes.windows(needle.len()).position(|w| w == needle)
}

/// Scoped ownership of a mutated source file.
///
/// Acquiring reads and remembers the original contents; every call to
/// [`apply_next`](SourceMutator::apply_next) rewrites the file from those
/// originals with the next invocation's edit. The original bytes are
/// restored by [`revert`](SourceMutator::revert), or by `Drop` if the
/// execution bails out before getting there.
#[derive(Debug)]
pub struct SourceMutator {
    path: PathBuf,
    kind: MutationKind,
    original: Vec<u8>,
    applied: usize,
    reverted: bool,
}

impl SourceMutator {
    /// Read and remember the target file's original contents.
    pub fn acquire(project_dir: &Path, spec: &MutatorSpec) -> io::Result<Self> {
        let path = project_dir.join(&spec.target);
        let original = fs::read(&path)?;
        Ok(SourceMutator {
            path,
            kind: spec.kind,
            original,
            applied: 0,
            reverted: false,
        })
    }

    /// Write the next invocation's mutated contents.
    pub fn apply_next(&mut self) -> io::Result<()> {
        let contents = mutate(self.kind, &self.original, self.applied);
        fs::write(&self.path, contents)?;
        self.applied += 1;
        Ok(())
    }

    /// Restore the original contents. Idempotent.
    pub fn revert(&mut self) -> io::Result<()> {
        if !self.reverted {
            fs::write(&self.path, &self.original)?;
            self.reverted = true;
        }
        Ok(())
    }

    /// Number of edits applied so far.
    pub fn applied_count(&self) -> usize {
        self.applied
    }
}

impl Drop for SourceMutator {
    fn drop(&mut self) {
        if !self.reverted {
            if let Err(e) = fs::write(&self.path, &self.original) {
                tracing::error!(path = %self.path.display(), error = %e, "failed to revert mutated file");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const JAVA_SOURCE: &str = "class Thing {\n    void existing() {\n        int a = 1;\n    }\n}\n";
    const RESOURCE_SOURCE: &str =
        "<resources>\n    <string name=\"app_name\">Demo</string>\n</resources>\n";

    fn spec(kind: MutationKind) -> MutatorSpec {
        MutatorSpec {
            kind,
            target: PathBuf::from("src/Thing.java"),
        }
    }

    #[test]
    fn abi_change_grows_by_expected_lengths() {
        let original = JAVA_SOURCE.as_bytes();
        assert_eq!(
            mutate(MutationKind::AbiJava, original, 0).len(),
            original.len() + 36
        );
        assert_eq!(
            mutate(MutationKind::AbiJava, original, 10).len(),
            original.len() + 37
        );
    }

    #[test]
    fn non_abi_change_grows_by_expected_lengths() {
        let original = JAVA_SOURCE.as_bytes();
        assert_eq!(
            mutate(MutationKind::NonAbiJava, original, 0).len(),
            original.len() + 16
        );
        assert_eq!(
            mutate(MutationKind::NonAbiJava, original, 10).len(),
            original.len() + 17
        );
    }

    #[test]
    fn resource_change_grows_by_expected_lengths() {
        let original = RESOURCE_SOURCE.as_bytes();
        assert_eq!(
            mutate(MutationKind::AndroidResource, original, 0).len(),
            original.len() + 53
        );
        assert_eq!(
            mutate(MutationKind::AndroidResource, original, 10).len(),
            original.len() + 54
        );
    }

    #[test]
    fn resource_value_change_grows_by_expected_lengths() {
        let original = RESOURCE_SOURCE.as_bytes();
        assert_eq!(
            mutate(MutationKind::AndroidResourceValue, original, 0).len(),
            original.len() + 9
        );
        assert_eq!(
            mutate(MutationKind::AndroidResourceValue, original, 10).len(),
            original.len() + 10
        );
    }

    #[test]
    fn abi_change_adds_method_inside_class() {
        let mutated = mutate(MutationKind::AbiJava, JAVA_SOURCE.as_bytes(), 3);
        let text = String::from_utf8(mutated).unwrap();
        assert!(text.contains("public void _changedForBuild3() { }"));
        assert!(text.ends_with("}\n"), "class brace must stay last");
    }

    #[test]
    fn non_abi_change_keeps_signatures() {
        let mutated = mutate(MutationKind::NonAbiJava, JAVA_SOURCE.as_bytes(), 3);
        let text = String::from_utf8(mutated).unwrap();
        // The statement lands inside the method, before both closing braces.
        let statement = text.find("int _extra = 3;").unwrap();
        assert!(statement > text.find("int a = 1;").unwrap());
        assert!(statement < text.rfind('}').unwrap());
        assert!(!text.contains("_changedForBuild"));
    }

    #[test]
    fn resource_value_change_edits_existing_string() {
        let mutated = mutate(MutationKind::AndroidResourceValue, RESOURCE_SOURCE.as_bytes(), 7);
        let text = String::from_utf8(mutated).unwrap();
        assert!(text.contains(">Demo mutated7</string>"));
    }

    #[test]
    fn distinct_indices_give_distinct_contents() {
        for kind in [
            MutationKind::AbiJava,
            MutationKind::NonAbiJava,
            MutationKind::AndroidResource,
            MutationKind::AndroidResourceValue,
        ] {
            let a = mutate(kind, JAVA_SOURCE.as_bytes(), 1);
            let b = mutate(kind, JAVA_SOURCE.as_bytes(), 2);
            assert_ne!(a, b, "{:?} must differ per invocation", kind);
        }
    }

    #[test]
    fn repeated_applies_then_revert_restore_original() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("src/Thing.java");
        fs::create_dir_all(target.parent().unwrap()).unwrap();
        fs::write(&target, RESOURCE_SOURCE).unwrap();

        let mut mutator =
            SourceMutator::acquire(dir.path(), &spec(MutationKind::AndroidResource)).unwrap();
        for _ in 0..5 {
            mutator.apply_next().unwrap();
        }
        assert_ne!(fs::read(&target).unwrap(), RESOURCE_SOURCE.as_bytes());
        mutator.revert().unwrap();

        assert_eq!(fs::read(&target).unwrap(), RESOURCE_SOURCE.as_bytes());
    }

    #[test]
    fn drop_reverts_after_abort() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("src/Thing.java");
        fs::create_dir_all(target.parent().unwrap()).unwrap();
        fs::write(&target, JAVA_SOURCE).unwrap();

        {
            let mut mutator =
                SourceMutator::acquire(dir.path(), &spec(MutationKind::AbiJava)).unwrap();
            mutator.apply_next().unwrap();
            mutator.apply_next().unwrap();
            // Dropped without an explicit revert, as after a fatal error.
        }

        assert_eq!(fs::read(&target).unwrap(), JAVA_SOURCE.as_bytes());
    }

    #[test]
    fn revert_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("src/Thing.java");
        fs::create_dir_all(target.parent().unwrap()).unwrap();
        fs::write(&target, JAVA_SOURCE).unwrap();

        let mut mutator = SourceMutator::acquire(dir.path(), &spec(MutationKind::AbiJava)).unwrap();
        mutator.apply_next().unwrap();
        mutator.revert().unwrap();
        mutator.revert().unwrap();

        assert_eq!(fs::read(&target).unwrap(), JAVA_SOURCE.as_bytes());
    }
}
