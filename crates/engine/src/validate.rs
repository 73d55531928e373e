//! Validation of configuration before any request is sent.
//!
//! Templates and paths are parsed without being evaluated, methods are
//! checked against what each operation allows, and write-only paths must
//! exist in the desired body.

use tether_types::{
    ActionConfig, ConfigError, EphemeralConfig, ExpiryType, HttpMethod, ListConfig, Locator, OperationConfig,
    PollOptions, PrecheckStep, RequestSpec, ResourceConfig,
};
use tether_util::{
    JsonPath, PathError,
    date_handling::{parse_duration, parse_scaled_duration},
    validate_locator, validate_template,
};

pub const CREATE_METHODS: &[HttpMethod] = &[HttpMethod::Post, HttpMethod::Put, HttpMethod::Patch];
pub const UPDATE_METHODS: &[HttpMethod] = &[HttpMethod::Put, HttpMethod::Patch, HttpMethod::Post];
pub const DELETE_METHODS: &[HttpMethod] = &[HttpMethod::Delete, HttpMethod::Post, HttpMethod::Put, HttpMethod::Patch];
pub const LIST_METHODS: &[HttpMethod] = &[HttpMethod::Get, HttpMethod::Post, HttpMethod::Head];

pub fn validate_resource(config: &ResourceConfig) -> Result<(), ConfigError> {
    config.create_method().ensure_one_of(CREATE_METHODS, "create")?;
    config.update_method().ensure_one_of(UPDATE_METHODS, "update")?;
    config.delete_method().ensure_one_of(DELETE_METHODS, "delete")?;

    template(&config.path)?;
    for raw in [&config.read_path, &config.update_path, &config.delete_path].into_iter().flatten() {
        template(raw)?;
    }
    for raw in [&config.create_selector, &config.read_selector].into_iter().flatten() {
        path(raw)?;
    }
    if let Some(raw) = &config.read_response_template {
        template(raw)?;
    }

    for raw in &config.write_only_attrs {
        if !path(raw)?.exists(&config.body) {
            return Err(ConfigError::WriteOnlyPathMissing { path: raw.clone() });
        }
    }
    paths(&config.output_attrs)?;

    for options in [&config.poll_create, &config.poll_update, &config.poll_delete].into_iter().flatten() {
        poll(options)?;
    }
    for steps in [&config.precheck_create, &config.precheck_update, &config.precheck_delete] {
        prechecks(steps)?;
    }
    Ok(())
}

pub fn validate_operation(config: &OperationConfig) -> Result<(), ConfigError> {
    template(&config.path)?;
    for raw in [&config.id_builder, &config.delete_path].into_iter().flatten() {
        template(raw)?;
    }
    if let Some(method) = config.delete_method {
        method.ensure_one_of(DELETE_METHODS, "delete")?;
    }
    paths(&config.output_attrs)?;
    for options in [&config.poll, &config.poll_delete].into_iter().flatten() {
        poll(options)?;
    }
    prechecks(&config.precheck)?;
    prechecks(&config.precheck_delete)
}

pub fn validate_action(config: &ActionConfig) -> Result<(), ConfigError> {
    template(&config.path)?;
    paths(&config.output_attrs)?;
    if let Some(options) = &config.poll {
        poll(options)?;
    }
    prechecks(&config.precheck)
}

pub fn validate_ephemeral(config: &EphemeralConfig) -> Result<(), ConfigError> {
    template(&config.path)?;
    paths(&config.output_attrs)?;
    for spec in [&config.renew, &config.close].into_iter().flatten() {
        request(spec)?;
    }

    if let Some(expiry_type) = &config.expiry_type {
        let Some(locator) = &config.expiry_locator else {
            return Err(ConfigError::Document {
                reason: format!("expiry_type '{expiry_type}' requires expiry_locator"),
            });
        };
        locator_path(locator)?;
        if *expiry_type == ExpiryType::Duration {
            parse_scaled_duration("1", config.expiry_unit.as_deref())?;
        }
    }
    if let Some(ahead) = &config.expiry_ahead {
        parse_duration(ahead)?;
    }
    Ok(())
}

pub fn validate_list(config: &ListConfig) -> Result<(), ConfigError> {
    config.method.ensure_one_of(LIST_METHODS, "list")?;
    template(&config.path)?;
    template(&config.id_template)?;
    for raw in [&config.selector, &config.read_selector].into_iter().flatten() {
        path(raw)?;
    }
    if let Some(raw) = &config.read_response_template {
        template(raw)?;
    }
    if let Some(locator) = &config.next_link_locator {
        locator_path(locator)?;
    }
    Ok(())
}

fn request(spec: &RequestSpec) -> Result<(), ConfigError> {
    template(&spec.path)
}

fn poll(options: &PollOptions) -> Result<(), ConfigError> {
    locator_path(&options.status_locator)?;
    if let Some(locator) = &options.url_locator {
        locator_path(locator)?;
    }
    Ok(())
}

fn prechecks(steps: &[PrecheckStep]) -> Result<(), ConfigError> {
    for step in steps {
        match step {
            PrecheckStep::Api(api) => {
                template(&api.path)?;
                poll(&api.poll)?;
            }
            PrecheckStep::Mutex(name) if name.is_empty() => {
                return Err(ConfigError::Document {
                    reason: "mutex precheck requires a name".to_string(),
                });
            }
            PrecheckStep::Mutex(name) => template(name)?,
        }
    }
    Ok(())
}

fn template(raw: &str) -> Result<(), ConfigError> {
    validate_template(raw).map_err(config_error)
}

fn path(raw: &str) -> Result<JsonPath, ConfigError> {
    JsonPath::parse(raw).map_err(config_error)
}

fn paths(raws: &[String]) -> Result<(), ConfigError> {
    parse_paths(raws).map(|_| ())
}

/// Parse a list of attribute paths.
pub(crate) fn parse_paths(raws: &[String]) -> Result<Vec<JsonPath>, ConfigError> {
    raws.iter().map(|raw| path(raw)).collect()
}

fn locator_path(locator: &Locator) -> Result<(), ConfigError> {
    validate_locator(locator).map_err(|err| ConfigError::invalid_locator(locator.to_string(), err.to_string()))
}

/// Map a path or template error onto the configuration error it represents.
fn config_error(error: PathError) -> ConfigError {
    match error {
        PathError::Syntax { path, reason } => ConfigError::invalid_path(path, reason),
        PathError::Template { template, reason } => ConfigError::invalid_template(template, reason),
        PathError::UnknownFunction { name } => ConfigError::invalid_template(format!("${name}"), "unknown function"),
        PathError::NotConcrete { path } => ConfigError::invalid_path(path, "path must address a single location"),
        PathError::Missing { reference } => ConfigError::invalid_template(reference, "reference is absent"),
    }
}
