//! Compression chains: the ordered stages a buffer passes through.

use std::fmt;

use scil_core::{Algorithm, AlgorithmKind, Datatype, Result, ScilError, StageKind};

/// Stages of a chain, one slot per [`StageKind`].
///
/// Preconditioner slots hold any number of stages; the other slots hold at
/// most one. The chain is immutable once built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Chain {
    precond_first: Vec<&'static Algorithm>,
    converter: Option<&'static Algorithm>,
    precond_second: Vec<&'static Algorithm>,
    data_compressor: Option<&'static Algorithm>,
    byte_compressor: Option<&'static Algorithm>,
    is_lossy: bool,
}

impl Chain {
    /// Parse a comma separated list of algorithm names or numeric ids.
    ///
    /// Unknown names yield [`ScilError::UnknownAlgorithm`]; stages out of
    /// order, a second converter, datatype or byte compressor, or an empty
    /// list yield [`ScilError::InvalidChain`].
    pub fn parse(spec: &str) -> Result<Self> {
        let mut algorithms = Vec::new();
        for token in spec.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            algorithms.push(scil_codecs::by_name(token)?);
        }
        Self::from_algorithms(algorithms)
    }

    /// Place already resolved algorithms into their slots, in order.
    pub fn from_algorithms(algorithms: impl IntoIterator<Item = &'static Algorithm>) -> Result<Self> {
        let mut chain = Chain::default();
        let mut last = StageKind::PreconditionerFirst;

        for algo in algorithms {
            let stage = algo.stage();
            if stage < last {
                return Err(ScilError::InvalidChain(format!(
                    "{} ({stage}) cannot follow a {last} stage",
                    algo.name
                )));
            }
            last = stage;

            let slot = match stage {
                StageKind::PreconditionerFirst => {
                    chain.precond_first.push(algo);
                    None
                }
                StageKind::PreconditionerSecond => {
                    chain.precond_second.push(algo);
                    None
                }
                StageKind::Converter => Some(&mut chain.converter),
                StageKind::Datatype => Some(&mut chain.data_compressor),
                StageKind::Byte => Some(&mut chain.byte_compressor),
            };
            if let Some(slot) = slot {
                if let Some(existing) = slot {
                    return Err(ScilError::InvalidChain(format!(
                        "{} and {} both claim the {stage} slot",
                        existing.name, algo.name
                    )));
                }
                *slot = Some(algo);
            }
            chain.is_lossy |= algo.is_lossy();
        }

        if chain.total_size() == 0 {
            return Err(ScilError::InvalidChain("chain contains no algorithm".into()));
        }
        Ok(chain)
    }

    /// Number of active stages, the first byte of every stream.
    pub fn total_size(&self) -> usize {
        self.precond_first.len()
            + self.precond_second.len()
            + usize::from(self.converter.is_some())
            + usize::from(self.data_compressor.is_some())
            + usize::from(self.byte_compressor.is_some())
    }

    #[inline]
    pub fn is_lossy(&self) -> bool {
        self.is_lossy
    }

    pub fn precond_first(&self) -> &[&'static Algorithm] {
        &self.precond_first
    }

    pub fn converter(&self) -> Option<&'static Algorithm> {
        self.converter
    }

    pub fn precond_second(&self) -> &[&'static Algorithm] {
        &self.precond_second
    }

    pub fn data_compressor(&self) -> Option<&'static Algorithm> {
        self.data_compressor
    }

    pub fn byte_compressor(&self) -> Option<&'static Algorithm> {
        self.byte_compressor
    }

    /// Every stage in execution order.
    pub fn stages(&self) -> impl Iterator<Item = &'static Algorithm> + '_ {
        self.precond_first
            .iter()
            .copied()
            .chain(self.converter)
            .chain(self.precond_second.iter().copied())
            .chain(self.data_compressor)
            .chain(self.byte_compressor)
    }

    /// Element type seen by the stages behind the converter.
    pub fn converted_datatype(&self, input: Datatype) -> Datatype {
        match self.converter.map(|a| a.kind) {
            Some(AlgorithmKind::Converter(c)) => c.output_datatype(input),
            _ => input,
        }
    }

    /// Check that every stage can handle the element type reaching it.
    pub fn check_applicable(&self, datatype: Datatype) -> Result<()> {
        let reject = |algo: &Algorithm, dt: Datatype| {
            ScilError::InvalidChain(format!("{} does not support {dt} data", algo.name))
        };
        for algo in &self.precond_first {
            if !algo.supports(datatype) {
                return Err(reject(algo, datatype));
            }
        }
        if let Some(algo) = self.converter {
            if !algo.supports(datatype) {
                return Err(reject(algo, datatype));
            }
        }
        let converted = self.converted_datatype(datatype);
        for algo in self.precond_second.iter().copied().chain(self.data_compressor) {
            if !algo.supports(converted) {
                return Err(reject(algo, converted));
            }
        }
        Ok(())
    }

    pub fn is_applicable(&self, datatype: Datatype) -> bool {
        self.check_applicable(datatype).is_ok()
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, algo) in self.stages().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            f.write_str(algo.name)?;
        }
        Ok(())
    }
}
