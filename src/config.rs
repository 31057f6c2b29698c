use crate::grading::GradeScale;
use anyhow::Context;
use std::env;
use std::path::PathBuf;

/// Runtime settings, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Workspace opened before the first request, if any.
    pub workspace: Option<PathBuf>,

    /// Denominator for attendance percentages.
    pub school_days: u32,

    pub grade_scale: GradeScale,

    pub seed: SeedCredentials,
}

/// Bootstrap passwords. Request params take precedence over these.
#[derive(Debug, Clone, Default)]
pub struct SeedCredentials {
    pub principal_password: Option<String>,
    pub teacher_password: Option<String>,
    pub student_password: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace: None,
            school_days: 30,
            grade_scale: GradeScale::default(),
            seed: SeedCredentials::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let school_days = match env::var("ROLLBOOK_SCHOOL_DAYS") {
            Ok(v) => v
                .trim()
                .parse::<u32>()
                .context("ROLLBOOK_SCHOOL_DAYS must be a positive integer")?,
            Err(_) => 30,
        };
        if school_days == 0 {
            anyhow::bail!("ROLLBOOK_SCHOOL_DAYS must be greater than zero");
        }

        let grade_scale = match env::var("ROLLBOOK_GRADE_SCALE") {
            Ok(v) if !v.trim().is_empty() => {
                GradeScale::parse(&v).context("invalid ROLLBOOK_GRADE_SCALE")?
            }
            _ => GradeScale::default(),
        };

        Ok(Self {
            workspace: non_empty_var("ROLLBOOK_WORKSPACE").map(PathBuf::from),
            school_days,
            grade_scale,
            seed: SeedCredentials {
                principal_password: non_empty_var("ROLLBOOK_SEED_PRINCIPAL_PASSWORD"),
                teacher_password: non_empty_var("ROLLBOOK_SEED_TEACHER_PASSWORD"),
                student_password: non_empty_var("ROLLBOOK_SEED_STUDENT_PASSWORD"),
            },
        })
    }

    /// Applies `--workspace PATH` / `--workspace=PATH`.
    pub fn apply_args(&mut self, args: &[String]) -> anyhow::Result<()> {
        let mut it = args.iter().skip(1);
        while let Some(arg) = it.next() {
            if arg == "--workspace" {
                let path = it.next().context("--workspace needs a path")?;
                self.workspace = Some(PathBuf::from(path));
            } else if let Some(path) = arg.strip_prefix("--workspace=") {
                self.workspace = Some(PathBuf::from(path));
            } else {
                anyhow::bail!("unknown argument: {arg}");
            }
        }
        Ok(())
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
