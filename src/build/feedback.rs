use colored::*;

/// Turns raw compiler or linker output into a short hint for the user.
pub struct FeedbackAnalyzer;

impl FeedbackAnalyzer {
    pub fn analyze(output: &str) -> Option<String> {
        // 1. Main function missing (Specific Linker Error)
        if output.contains("undefined reference to `main'")
            || (output.contains("Undefined symbols for architecture")
                && output.contains("\"_main\""))
        {
            return Some(format!(
                "An executable is missing a {} function.\nCheck that one of its {} defines the entry point.",
                "main()".bold().yellow(),
                "sources".bold().green()
            ));
        }

        // 2. Missing library or wrong link order
        if output.contains("undefined reference to") || output.contains("Undefined symbols") {
            return Some(format!(
                "It looks like a {} problem.\nAdd the library to the executable's {} or {} in buildit.toml,\nand make sure every static library lists what it needs in {}.",
                "link".bold().red(),
                "depends_on".bold().yellow(),
                "system_libraries".bold().yellow(),
                "depends_on".bold().yellow()
            ));
        }

        // 3. Missing Header (Compiler Error)
        if output.contains("fatal error: ")
            && (output.contains("No such file or directory") || output.contains("file not found"))
        {
            return Some(format!(
                "A {} could not be found.\nCheck {} in [build] or on the artifact in buildit.toml.",
                "header".bold().red(),
                "include_directories".bold().yellow()
            ));
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linker_error() {
        let err = "main.c:(.text+0x5): undefined reference to `foo'";
        let msg = FeedbackAnalyzer::analyze(err).unwrap();
        assert!(msg.contains("buildit.toml"));
        assert!(msg.contains("problem"));
    }

    #[test]
    fn test_include_error() {
        let err = "a.c:1:10: fatal error: foo.h: No such file or directory";
        let msg = FeedbackAnalyzer::analyze(err).unwrap();
        assert!(msg.contains("could not be found"));

        let clang = "a.c:1:10: fatal error: 'foo.h' file not found";
        assert!(FeedbackAnalyzer::analyze(clang).is_some());
    }

    #[test]
    fn test_main_error() {
        let err = "crt1.o: in function `_start': undefined reference to `main'";
        let msg = FeedbackAnalyzer::analyze(err).unwrap();
        assert!(msg.contains("missing a"));
    }

    #[test]
    fn test_unknown_output() {
        assert!(FeedbackAnalyzer::analyze("a.c:3: warning: unused variable").is_none());
    }
}
