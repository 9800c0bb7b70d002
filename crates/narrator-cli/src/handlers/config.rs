//! Config command handler.

use anyhow::{Context, Result};

use narrator_core::{NarratorSettings, SettingsUpdate};

use crate::bootstrap::CliContext;
use crate::commands::ConfigCommand;

pub async fn execute(ctx: &CliContext, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            let settings = ctx.settings().await?;
            print_settings(&settings);
            println!();
            println!("Settings file: {}", ctx.settings_store().path().display());
            Ok(())
        }
        ConfigCommand::Set {
            target,
            min,
            server_url,
            voice,
            language,
            generation_speed,
            temperature,
            playback_speed,
            preserves_pitch,
        } => {
            let update = SettingsUpdate {
                server_url,
                voice,
                language,
                generation_speed,
                temperature,
                playback_speed,
                preserves_pitch,
                target_buffer_size: target,
                min_buffer_size: min,
            };
            let settings = apply_update(ctx, &update).await?;
            println!("✓ Settings updated.");
            if update.touches_generation() {
                println!("  Generation settings changed; audio will be regenerated.");
            }
            println!();
            print_settings(&settings);
            Ok(())
        }
        ConfigCommand::Reset => {
            ctx.settings_store()
                .save_settings(&NarratorSettings::default())
                .await?;
            println!("✓ Settings reset to defaults.");
            Ok(())
        }
    }
}

/// Merge, validate and save. Nothing is written when validation fails.
async fn apply_update(ctx: &CliContext, update: &SettingsUpdate) -> Result<NarratorSettings> {
    let store = ctx.settings_store();
    let mut settings = store.load_settings().await?;
    settings.merge(update);
    settings.audio = settings.audio.clamped();
    settings.validate().context("Invalid buffer settings")?;
    if let Some(ref url) = update.server_url {
        crate::bootstrap::server_url(url)?;
    }
    store.save_settings(&settings).await?;
    Ok(settings)
}

fn print_settings(settings: &NarratorSettings) {
    println!("Server:            {}", settings.server_url);
    println!("Voice:             {}", settings.generation.voice);
    println!("Language:          {}", settings.generation.language);
    println!("Generation speed:  {}", settings.generation.speed);
    println!("Temperature:       {}", settings.generation.temperature);
    println!("Playback speed:    {}", settings.audio.speed);
    println!("Preserve pitch:    {}", settings.audio.preserves_pitch);
    println!(
        "Buffer:            {} ahead, start after {}",
        settings.buffer.target_buffer_size, settings.buffer.min_buffer_size
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn invalid_update_is_not_saved() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = CliContext::new(Some(tmp.path()), None).unwrap();

        let update = SettingsUpdate {
            target_buffer_size: Some(2),
            min_buffer_size: Some(5),
            ..SettingsUpdate::default()
        };
        assert!(apply_update(&ctx, &update).await.is_err());
        assert!(!ctx.settings_store().path().exists());
    }

    #[tokio::test]
    async fn valid_update_is_persisted() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = CliContext::new(Some(tmp.path()), None).unwrap();

        let update = SettingsUpdate {
            target_buffer_size: Some(5),
            voice: Some("alloy".to_string()),
            playback_speed: Some(9.0),
            ..SettingsUpdate::default()
        };
        apply_update(&ctx, &update).await.unwrap();

        let saved = ctx.settings_store().load_settings().await.unwrap();
        assert_eq!(saved.buffer.target_buffer_size, 5);
        assert_eq!(saved.generation.voice, "alloy");
        assert!((saved.audio.speed - 3.0).abs() < f32::EPSILON);
    }
}
