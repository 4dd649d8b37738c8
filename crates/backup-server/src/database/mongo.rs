use std::{
    ffi::OsString,
    fs,
    path::Path,
    process::{Command, Output},
};

use serde::{Deserialize, Serialize};

use super::{DatabaseTool, ToolError};

/// Dump and restore a MongoDB database with `mongodump`, `mongorestore` and `mongosh`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MongoTools {
    /// The connection string of the database. Must name the database when `database_name` is unset,
    /// otherwise `mongodump` dumps every database while only mongosh's default one is counted.
    pub uri: String,

    /// The database to dump, restore and count documents in. The connection string's database
    /// when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_name: Option<String>,

    /// The program used to dump the database.
    #[serde(default = "default_dump_program")]
    pub dump_program: String,

    /// The program used to restore the database.
    #[serde(default = "default_restore_program")]
    pub restore_program: String,

    /// The shell used to count documents.
    #[serde(default = "default_shell_program")]
    pub shell_program: String,
}

fn default_dump_program() -> String {
    "mongodump".to_string()
}

fn default_restore_program() -> String {
    "mongorestore".to_string()
}

fn default_shell_program() -> String {
    "mongosh".to_string()
}

impl MongoTools {
    /// The arguments to dump the database to an archive.
    pub fn dump_arguments(&self, destination: &Path) -> Vec<OsString> {
        let mut arguments = vec![
            format!("--uri={}", self.uri).into(),
            archive_argument(destination),
            "--gzip".into(),
        ];

        if let Some(name) = &self.database_name {
            arguments.push(format!("--db={name}").into());
        }

        arguments
    }

    /// The arguments to restore the database from an archive, dropping existing collections.
    pub fn restore_arguments(&self, source: &Path) -> Vec<OsString> {
        let mut arguments = vec![
            format!("--uri={}", self.uri).into(),
            archive_argument(source),
            "--gzip".into(),
            "--drop".into(),
        ];

        if let Some(name) = &self.database_name {
            arguments.push(format!("--nsInclude={name}.*").into());
        }

        arguments
    }

    /// The `mongosh` script that prints the total document count of the database.
    pub fn count_script(&self) -> String {
        let database = match &self.database_name {
            // JSON strings are valid JavaScript string literals.
            Some(name) => format!(
                "db.getSiblingDB({})",
                serde_json::Value::String(name.clone())
            ),
            None => "db".to_string(),
        };

        format!(
            "const target = {database}; \
             let total = 0; \
             for (const name of target.getCollectionNames()) {{ \
             total += target.getCollection(name).countDocuments({{}}); \
             }} \
             print(total);"
        )
    }
}

impl DatabaseTool for MongoTools {
    fn count_documents(&self) -> Result<u64, ToolError> {
        let script = self.count_script();
        let output = Command::new(&self.shell_program)
            .arg(&self.uri)
            .args(["--quiet", "--eval", script.as_str()])
            .output()
            .map_err(ToolError::RunCommand)?;

        let stdout = successful_stdout(output)?;
        parse_document_count(&stdout)
    }

    fn dump(&self, destination: &Path) -> Result<u64, ToolError> {
        let output = Command::new(&self.dump_program)
            .args(self.dump_arguments(destination))
            .output()
            .map_err(ToolError::RunCommand)?;

        successful_stdout(output)?;

        let archive_metadata =
            fs::metadata(destination).map_err(|e| ToolError::Io(e, "get archive metadata"))?;

        Ok(archive_metadata.len())
    }

    fn restore(&self, source: &Path) -> Result<(), ToolError> {
        let output = Command::new(&self.restore_program)
            .args(self.restore_arguments(source))
            .output()
            .map_err(ToolError::RunCommand)?;

        successful_stdout(output)?;

        Ok(())
    }
}

impl Default for MongoTools {
    fn default() -> Self {
        Self {
            uri: "mongodb://localhost:27017/site".to_string(),
            database_name: None,
            dump_program: default_dump_program(),
            restore_program: default_restore_program(),
            shell_program: default_shell_program(),
        }
    }
}

fn archive_argument(path: &Path) -> OsString {
    let mut argument = OsString::from("--archive=");
    argument.push(path);
    argument
}

fn successful_stdout(output: Output) -> Result<String, ToolError> {
    if !output.status.success() {
        let error = String::from_utf8_lossy(&output.stderr).to_string();
        return Err(ToolError::CommandErrored(error));
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Parse the document count printed by the count script.
fn parse_document_count(stdout: &str) -> Result<u64, ToolError> {
    let line = stdout
        .lines()
        .map(str::trim)
        .rfind(|line| !line.is_empty())
        .ok_or_else(|| ToolError::InvalidOutput("no document count was printed".to_string()))?;

    line.parse()
        .map_err(|_| ToolError::InvalidOutput(format!("'{line}' is not a document count")))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn dump_and_restore_arguments() {
        let tools = MongoTools {
            uri: "mongodb://db:27017/site".to_string(),
            ..MongoTools::default()
        };
        let path = PathBuf::from("backups/nightly.gz");

        assert_eq!(
            tools.dump_arguments(&path),
            [
                "--uri=mongodb://db:27017/site",
                "--archive=backups/nightly.gz",
                "--gzip"
            ]
        );
        assert_eq!(
            tools.restore_arguments(&path),
            [
                "--uri=mongodb://db:27017/site",
                "--archive=backups/nightly.gz",
                "--gzip",
                "--drop"
            ]
        );
    }

    #[test]
    fn arguments_select_database() {
        let tools = MongoTools {
            uri: "mongodb://db:27017".to_string(),
            database_name: Some("site".to_string()),
            ..MongoTools::default()
        };
        let path = PathBuf::from("backups/nightly.gz");

        assert_eq!(
            tools.dump_arguments(&path).last().unwrap(),
            &OsString::from("--db=site")
        );
        assert_eq!(
            tools.restore_arguments(&path).last().unwrap(),
            &OsString::from("--nsInclude=site.*")
        );
    }

    #[test]
    fn count_script_selects_database() {
        let mut tools = MongoTools::default();
        assert!(tools.count_script().starts_with("const target = db;"));

        tools.database_name = Some("site\"; drop".to_string());
        assert!(
            tools
                .count_script()
                .starts_with(r#"const target = db.getSiblingDB("site\"; drop");"#)
        );
    }

    #[test]
    fn parses_last_line() {
        assert_eq!(parse_document_count("42\n").unwrap(), 42);
        assert_eq!(parse_document_count("Connecting\n  17  \n\n").unwrap(), 17);
    }

    #[test]
    fn rejects_bad_output() {
        assert!(matches!(
            parse_document_count(""),
            Err(ToolError::InvalidOutput(_))
        ));
        assert!(matches!(
            parse_document_count("-1"),
            Err(ToolError::InvalidOutput(_))
        ));
        assert!(matches!(
            parse_document_count("NaN"),
            Err(ToolError::InvalidOutput(_))
        ));
    }

    #[test]
    fn missing_program() {
        let tools = MongoTools {
            shell_program: "definitely-not-a-real-mongosh".to_string(),
            ..MongoTools::default()
        };

        assert!(matches!(
            tools.count_documents(),
            Err(ToolError::RunCommand(_))
        ));
    }
}
