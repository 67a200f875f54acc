//! The fractal parameters file: family, parameters, bounds and coloring.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use orbitscope_core::formula::{check_parameters, create, create_default, families};
use orbitscope_core::{Bounds, CoreError, FormulaRef, FractalParameters};
use orbitscope_render::{ColoringParameters, IteratorController, RenderError};

use crate::error::SessionError;

/// Everything needed to reproduce an image except the iteration data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParametersFile {
    pub family: String,
    pub parameters: FractalParameters,
    pub bounds: Bounds,
    #[serde(default)]
    pub coloring: ColoringParameters,
}

impl ParametersFile {
    /// A file for `family` with its default parameters and bounds.
    pub fn for_family(family: &str) -> crate::Result<Self> {
        let formula = create_default(family).map_err(|e| match e {
            CoreError::UnsupportedFractal(name) => SessionError::UnsupportedFractal(name),
            other => other.into(),
        })?;
        Ok(Self {
            family: formula.family_name().to_string(),
            parameters: formula.params().clone(),
            bounds: formula.default_bounds(),
            coloring: ColoringParameters::default(),
        })
    }

    /// Capture the controller's current session.
    pub fn capture(controller: &IteratorController) -> Self {
        Self {
            family: controller.family_name().to_string(),
            parameters: controller.parameters().clone(),
            bounds: controller.bounds(),
            coloring: controller.coloring().clone(),
        }
    }

    pub fn from_json(json: &str) -> crate::Result<Self> {
        let file: Self = serde_json::from_str(json)?;
        file.check_family()?;
        check_parameters(&file.family, &file.parameters)?;
        Ok(file)
    }

    pub(crate) fn check_family(&self) -> crate::Result<()> {
        if families().iter().any(|f| f.name == self.family) {
            Ok(())
        } else {
            Err(SessionError::UnsupportedFractal(self.family.clone()))
        }
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: &Path) -> crate::Result<Self> {
        let json = fs::read_to_string(path).map_err(|e| SessionError::io(path, e))?;
        let file = Self::from_json(&json)?;
        info!("Loaded {} parameters from {}", file.family, path.display());
        Ok(file)
    }

    pub fn save(&self, path: &Path) -> crate::Result<()> {
        fs::write(path, self.to_json()?).map_err(|e| SessionError::io(path, e))?;
        debug!("Saved parameters to {}", path.display());
        Ok(())
    }

    /// Instantiate the family described by this file.
    pub fn formula(&self) -> crate::Result<FormulaRef> {
        Ok(create(&self.family, self.parameters.clone())?)
    }

    /// Replace the controller's family, parameters, bounds and coloring.
    ///
    /// Fails before touching anything if the controller is busy or the
    /// family cannot be built.
    pub fn apply_to(&self, controller: &mut IteratorController) -> crate::Result<()> {
        if controller.is_busy() {
            return Err(RenderError::Busy.into());
        }
        let formula = self.formula()?;
        controller.set_formula(formula)?;
        controller.set_bounds(self.bounds)?;
        controller.set_coloring(self.coloring.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbitscope_core::{Complex, ScreenSize};
    use orbitscope_render::{BuiltinMap, ScalingMode};

    #[test]
    fn json_round_trip_is_exact() {
        let mut file = ParametersFile::for_family("Julia").unwrap();
        file.parameters.dual_parameter = Complex::new(-0.123_456_789_012_345_6, 0.745_1);
        file.bounds = Bounds::new(Complex::new(-0.1, 0.1), Complex::new(0.2 / 3.0, 1.0 / 7.0)).unwrap();
        file.coloring.exterior.map = BuiltinMap::Ocean;
        file.coloring.exterior.scaling = ScalingMode::RankOrder;

        let json = file.to_json().unwrap();
        let back = ParametersFile::from_json(&json).unwrap();
        assert_eq!(back, file);
    }

    #[test]
    fn field_order_is_stable() {
        let json = ParametersFile::for_family("Mandelbrot").unwrap().to_json().unwrap();
        let family = json.find("\"family\"").unwrap();
        let parameters = json.find("\"parameters\"").unwrap();
        let bounds = json.find("\"bounds\"").unwrap();
        let coloring = json.find("\"coloring\"").unwrap();
        assert!(family < parameters && parameters < bounds && bounds < coloring);
    }

    #[test]
    fn unknown_family_is_rejected() {
        let mut json: serde_json::Value =
            serde_json::from_str(&ParametersFile::for_family("Mandelbrot").unwrap().to_json().unwrap())
                .unwrap();
        json["family"] = "Mandelbulb".into();
        let err = ParametersFile::from_json(&json.to_string()).unwrap_err();
        assert!(matches!(err, SessionError::UnsupportedFractal(ref n) if n == "Mandelbulb"));
        assert!(matches!(
            ParametersFile::for_family("Mandelbulb"),
            Err(SessionError::UnsupportedFractal(_))
        ));
    }

    #[test]
    fn parse_errors_carry_position() {
        let err = ParametersFile::from_json("{\n  \"family\": \"Julia\",\n  oops\n}").unwrap_err();
        match err {
            SessionError::Parse { line, .. } => assert_eq!(line, 3),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn invalid_parameters_fail_to_load() {
        let mut json: serde_json::Value =
            serde_json::from_str(&ParametersFile::for_family("Mandelbrot").unwrap().to_json().unwrap())
                .unwrap();
        json["parameters"]["max_iterations"] = 0.into();
        assert!(matches!(
            ParametersFile::from_json(&json.to_string()),
            Err(SessionError::Parse { .. })
        ));
    }

    #[test]
    fn newton_degree_beyond_cap_fails_to_load() {
        let mut json: serde_json::Value =
            serde_json::from_str(&ParametersFile::for_family("NewtonRaphson").unwrap().to_json().unwrap())
                .unwrap();
        json["parameters"]["power"] = 1e12_f64.into();
        let err = ParametersFile::from_json(&json.to_string()).unwrap_err();
        assert!(matches!(
            err,
            SessionError::Core(CoreError::InvalidParameter { name: "power", .. })
        ));
    }

    #[test]
    fn missing_coloring_uses_defaults() {
        let file = ParametersFile::for_family("Mandelbrot").unwrap();
        let mut json: serde_json::Value = serde_json::from_str(&file.to_json().unwrap()).unwrap();
        json.as_object_mut().unwrap().remove("coloring");
        let back = ParametersFile::from_json(&json.to_string()).unwrap();
        assert_eq!(back.coloring, ColoringParameters::default());
    }

    #[test]
    fn apply_and_capture_agree() {
        let formula = create_default("Mandelbrot").unwrap();
        let mut controller =
            IteratorController::with_workers(formula, ScreenSize::new(8, 8).unwrap(), 1, 2).unwrap();
        let mut file = ParametersFile::for_family("BurningShip").unwrap();
        file.coloring.smooth = false;
        file.apply_to(&mut controller).unwrap();
        assert_eq!(ParametersFile::capture(&controller), file);
    }
}
