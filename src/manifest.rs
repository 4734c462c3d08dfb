use crate::felt::Felt;
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fmt,
    fs,
    path::{
        Path,
        PathBuf,
    },
};

pub const CONFIG_CONTRACT_TAG: &str = "dopewars-config";
pub const GAME_CONTRACT_TAG: &str = "dopewars-game";

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, clap::ValueEnum)]
pub enum Profile {
    #[default]
    Dev,
    Sepolia,
    Mainnet,
}

impl Profile {
    pub fn file_name(self) -> &'static str {
        match self {
            Profile::Dev => "manifest_dev.json",
            Profile::Sepolia => "manifest_sepolia.json",
            Profile::Mainnet => "manifest_mainnet.json",
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Profile::Dev => "Dev",
            Profile::Sepolia => "Sepolia",
            Profile::Mainnet => "Mainnet",
        };
        write!(f, "{name}")
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorldRecord {
    pub address: Felt,
    #[serde(default)]
    pub seed: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContractRecord {
    pub address: Felt,
    pub tag: String,
    #[serde(default)]
    pub selector: Option<Felt>,
}

/// The parts of a world manifest the client needs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Manifest {
    pub world: WorldRecord,
    #[serde(default)]
    pub contracts: Vec<ContractRecord>,
}

impl Manifest {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = expand(path.as_ref())?;
        let data = fs::read(&path)
            .wrap_err_with(|| format!("Failed to read manifest at {}", path.display()))?;
        let manifest = serde_json::from_slice::<Manifest>(&data)
            .wrap_err_with(|| format!("Failed to parse manifest JSON at {}", path.display()))?;
        Ok(manifest)
    }

    pub fn contract_address(&self, tag: &str) -> Result<Felt> {
        self.contracts
            .iter()
            .find(|c| c.tag == tag)
            .map(|c| c.address)
            .ok_or_else(|| eyre!("contract {tag} not found in manifest"))
    }

    pub fn config_address(&self) -> Result<Felt> {
        self.contract_address(CONFIG_CONTRACT_TAG)
    }

    pub fn game_address(&self) -> Result<Felt> {
        self.contract_address(GAME_CONTRACT_TAG)
    }
}

fn expand(path: &Path) -> Result<PathBuf> {
    let raw = path.to_string_lossy();
    let expanded = shellexpand::full(&raw)
        .wrap_err_with(|| format!("Failed to expand path {raw}"))?;
    Ok(PathBuf::from(expanded.as_ref()))
}
