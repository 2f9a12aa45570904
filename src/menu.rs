//! Interactive menu
//!
//! Reads choices line by line and dispatches to the ops runners. Input and
//! output are generic so the loop can be driven from a script.

use crate::cluster::ClusterAdmin;
use crate::common::{banner, Config, Error, Result};
use crate::ops::{
    cleanup_cluster, cluster_info, populate_cluster, test_connection, verify_placement,
    zone_status, ZoneShardingManager,
};
use std::fmt;
use std::io::{BufRead, Write};
use std::str::FromStr;

pub const TITLE: &str = "MongoDB Atlas Zone Sharding Demo Runner";

const TAKEAWAYS: &[&str] = &[
    "Data is localized to specific zones in your Atlas cluster",
    "Common collections are duplicated across all regions",
    "Tenant-specific data is sharded by region",
    "Zone sharding works seamlessly with Atlas",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    CompleteDemo,
    Setup,
    Populate,
    Status,
    Verify,
    Cleanup,
    TestConnection,
    ClusterInfo,
    Exit,
}

impl MenuChoice {
    pub const ALL: [MenuChoice; 9] = [
        MenuChoice::CompleteDemo,
        MenuChoice::Setup,
        MenuChoice::Populate,
        MenuChoice::Status,
        MenuChoice::Verify,
        MenuChoice::Cleanup,
        MenuChoice::TestConnection,
        MenuChoice::ClusterInfo,
        MenuChoice::Exit,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            MenuChoice::CompleteDemo => "Run Complete Atlas Demo",
            MenuChoice::Setup => "Setup Zone Sharding Only",
            MenuChoice::Populate => "Populate Sample Data Only",
            MenuChoice::Status => "Check Zone Status",
            MenuChoice::Verify => "Verify Data Placement",
            MenuChoice::Cleanup => "Cleanup Demo Data",
            MenuChoice::TestConnection => "Test Atlas Connection",
            MenuChoice::ClusterInfo => "Show Atlas Cluster Info",
            MenuChoice::Exit => "Exit",
        }
    }
}

impl FromStr for MenuChoice {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let n: usize = s
            .trim()
            .parse()
            .map_err(|_| Error::Other(format!("invalid choice: {}", s.trim())))?;
        n.checked_sub(1)
            .and_then(|i| Self::ALL.get(i).copied())
            .ok_or_else(|| Error::Other(format!("invalid choice: {}", n)))
    }
}

impl fmt::Display for MenuChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub struct Menu<'a, R, W> {
    cluster: &'a dyn ClusterAdmin,
    config: &'a Config,
    input: R,
    output: W,
}

impl<'a, R: BufRead, W: Write> Menu<'a, R, W> {
    pub fn new(cluster: &'a dyn ClusterAdmin, config: &'a Config, input: R, output: W) -> Self {
        Self {
            cluster,
            config,
            input,
            output,
        }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    /// Loop until Exit or end of input
    pub async fn run(&mut self) -> Result<()> {
        writeln!(self.output, "{}", banner(TITLE))?;
        writeln!(self.output, "atlas-zones {}\n", crate::VERSION)?;

        loop {
            self.print_menu()?;
            let Some(line) = self.prompt("Enter your choice (1-9): ")? else {
                writeln!(self.output)?;
                break;
            };

            match line.parse::<MenuChoice>() {
                Ok(MenuChoice::Exit) => {
                    writeln!(self.output, "Goodbye!")?;
                    break;
                }
                Ok(choice) => {
                    if let Err(e) = self.dispatch(choice).await {
                        tracing::error!(choice = %choice, error = %e, "Menu action failed");
                        self.print_error(&e)?;
                    }
                }
                Err(_) => writeln!(self.output, "Invalid choice. Please enter 1-9.")?,
            }

            if self.prompt("\nPress Enter to continue...")?.is_none() {
                writeln!(self.output)?;
                break;
            }
        }
        Ok(())
    }

    /// Run one menu action
    pub async fn dispatch(&mut self, choice: MenuChoice) -> Result<()> {
        match choice {
            MenuChoice::CompleteDemo => self.complete_demo().await,
            MenuChoice::Setup => self.setup().await,
            MenuChoice::Populate => self.populate().await,
            MenuChoice::Status => self.status().await,
            MenuChoice::Verify => self.verify().await,
            MenuChoice::Cleanup => {
                let answer = self.prompt("Are you sure you want to cleanup all demo data? (y/N): ")?;
                if matches!(answer.as_deref().map(str::trim), Some("y" | "Y")) {
                    self.cleanup().await
                } else {
                    writeln!(self.output, "Cleanup cancelled")?;
                    Ok(())
                }
            }
            MenuChoice::TestConnection => {
                self.header("Testing Atlas Connection")?;
                let report = test_connection(self.cluster).await?;
                writeln!(self.output, "{}", report)?;
                Ok(())
            }
            MenuChoice::ClusterInfo => {
                self.header("Atlas Cluster Information")?;
                let info = cluster_info(self.cluster).await?;
                writeln!(self.output, "{}", info)?;
                Ok(())
            }
            MenuChoice::Exit => Ok(()),
        }
    }

    async fn setup(&mut self) -> Result<()> {
        self.header("Setting Up Atlas Zone Sharding")?;
        let report = ZoneShardingManager::new(self.cluster, self.config)
            .setup()
            .await?;
        writeln!(self.output, "{}", report)?;
        Ok(())
    }

    async fn populate(&mut self) -> Result<()> {
        self.header("Populating Sample Data")?;
        let report = populate_cluster(self.cluster, self.config).await?;
        writeln!(self.output, "{}", report)?;
        Ok(())
    }

    async fn status(&mut self) -> Result<()> {
        self.header("Zone Status Check")?;
        let report = zone_status(self.cluster, self.config).await?;
        writeln!(self.output, "{}", report)?;
        Ok(())
    }

    async fn verify(&mut self) -> Result<()> {
        self.header("Verifying Data Placement")?;
        let report = verify_placement(self.cluster, self.config).await?;
        writeln!(self.output, "{}", report)?;
        Ok(())
    }

    async fn cleanup(&mut self) -> Result<()> {
        self.header("Cleaning Up Demo Data")?;
        let report = cleanup_cluster(self.cluster, self.config).await?;
        writeln!(self.output, "{}", report)?;
        Ok(())
    }

    async fn complete_demo(&mut self) -> Result<()> {
        self.header("MongoDB Atlas Zone Sharding Demo")?;
        writeln!(self.output, "Welcome to the Atlas Zone Sharding Demo!")?;
        writeln!(
            self.output,
            "This demo will show how to implement zone sharding on your Atlas cluster."
        )?;
        if self.prompt("\nPress Enter to start the demo...")?.is_none() {
            return Ok(());
        }

        // A failed step is reported and the demo moves on
        for choice in [
            MenuChoice::Setup,
            MenuChoice::Populate,
            MenuChoice::Status,
            MenuChoice::Verify,
        ] {
            let result = match choice {
                MenuChoice::Setup => self.setup().await,
                MenuChoice::Populate => self.populate().await,
                MenuChoice::Status => self.status().await,
                _ => self.verify().await,
            };
            if let Err(e) = result {
                tracing::error!(step = %choice, error = %e, "Demo step failed");
                self.print_error(&e)?;
            }
        }

        self.header("Demo Complete!")?;
        writeln!(self.output, "Atlas zone sharding demo completed successfully!")?;
        writeln!(self.output, "\nKey takeaways:")?;
        for (i, takeaway) in TAKEAWAYS.iter().enumerate() {
            writeln!(self.output, "{}. {}", i + 1, takeaway)?;
        }
        Ok(())
    }

    fn print_error(&mut self, e: &Error) -> Result<()> {
        writeln!(self.output, "✗ Error: {}", e)?;
        if e.is_retryable() {
            writeln!(
                self.output,
                "  Check the cluster's network access list and try again"
            )?;
        }
        Ok(())
    }

    fn print_menu(&mut self) -> Result<()> {
        writeln!(self.output, "MongoDB Atlas Zone Sharding Demo Menu:")?;
        for (i, choice) in MenuChoice::ALL.iter().enumerate() {
            writeln!(self.output, "{}. {}", i + 1, choice)?;
        }
        writeln!(self.output)?;
        Ok(())
    }

    fn header(&mut self, title: &str) -> Result<()> {
        writeln!(self.output, "\n{}\n", banner(title))?;
        Ok(())
    }

    /// Print `text` and read one line; `None` at end of input
    fn prompt(&mut self, text: &str) -> Result<Option<String>> {
        write!(self.output, "{}", text)?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }
}
