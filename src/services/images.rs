use crate::core::error::{GenerationError, ProviderError};
use crate::core::state::Image;
use crate::services::imagen::{ImageProvider, MAX_IMAGES_PER_CALL};
use crate::services::retry::{Retrier, Sleeper};
use anyhow::anyhow;
use std::sync::Arc;
use std::time::Duration;

/// Splits `count` into consecutive batches of at most `batch_size`.
pub fn batch_sizes(count: u32, batch_size: u32) -> Vec<u32> {
    let batch_size = batch_size.max(1);
    let mut sizes = Vec::new();
    let mut remaining = count;
    while remaining > 0 {
        let n = remaining.min(batch_size);
        sizes.push(n);
        remaining -= n;
    }
    sizes
}

pub struct ImageGenerator {
    provider: Arc<dyn ImageProvider>,
    retrier: Retrier,
    sleeper: Arc<dyn Sleeper>,
    batch_size: u32,
    batch_pause: Duration,
}

impl ImageGenerator {
    pub fn new(
        provider: Arc<dyn ImageProvider>,
        retrier: Retrier,
        sleeper: Arc<dyn Sleeper>,
        batch_size: u32,
        batch_pause: Duration,
    ) -> Self {
        Self {
            provider,
            retrier,
            sleeper,
            batch_size: batch_size.clamp(1, MAX_IMAGES_PER_CALL),
            batch_pause,
        }
    }

    pub async fn generate_one(&self, prompt: &str) -> Result<Image, GenerationError> {
        let mut images = self
            .retrier
            .call(|| self.provider.generate_images(prompt, 1))
            .await?;
        if images.is_empty() {
            return Err(ProviderError::Other(anyhow!("Image provider returned no image")).into());
        }
        Ok(images.swap_remove(0))
    }

    /// Generates `count` candidates in paced batches. Any failed batch fails
    /// the whole call.
    pub async fn generate_many(&self, prompt: &str, count: u32) -> Result<Vec<Image>, GenerationError> {
        if count == 0 {
            return Err(GenerationError::InvalidRequest(
                "at least one image must be requested".to_string(),
            ));
        }

        let batches = batch_sizes(count, self.batch_size);
        let mut images = Vec::with_capacity(count as usize);
        for (i, size) in batches.iter().enumerate() {
            if i > 0 {
                self.sleeper.sleep(self.batch_pause).await;
            }
            log::debug!("Image batch {}/{} ({} images)", i + 1, batches.len(), size);
            let batch = self
                .retrier
                .call(|| self.provider.generate_images(prompt, *size))
                .await?;
            images.extend(batch);
        }
        Ok(images)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::state::tests::image;
    use crate::services::retry::tests::RecordingSleeper;
    use crate::services::retry::RetryPolicy;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Returns images tagged with a running counter and records batch sizes.
    #[derive(Default)]
    pub(crate) struct CountingImageProvider {
        pub(crate) batches: Mutex<Vec<u32>>,
        pub(crate) fail_on_batch: Option<usize>,
    }

    #[async_trait]
    impl ImageProvider for CountingImageProvider {
        async fn generate_images(&self, _prompt: &str, count: u32) -> Result<Vec<Image>, ProviderError> {
            let mut batches = self.batches.lock().unwrap();
            batches.push(count);
            if self.fail_on_batch == Some(batches.len()) {
                return Err(ProviderError::Other(anyhow!("provider down")));
            }
            let produced: u32 = batches[..batches.len() - 1].iter().sum();
            Ok((0..count).map(|i| image((produced + i) as u8)).collect())
        }
    }

    fn generator(provider: Arc<CountingImageProvider>) -> (ImageGenerator, Arc<RecordingSleeper>) {
        let sleeper = Arc::new(RecordingSleeper::default());
        let retrier = Retrier::new(RetryPolicy::default(), sleeper.clone());
        let generator = ImageGenerator::new(provider, retrier, sleeper.clone(), 4, Duration::from_secs(1));
        (generator, sleeper)
    }

    #[test]
    fn test_batch_sizes() {
        assert_eq!(batch_sizes(10, 4), vec![4, 4, 2]);
        assert_eq!(batch_sizes(4, 4), vec![4]);
        assert_eq!(batch_sizes(1, 4), vec![1]);
        assert!(batch_sizes(0, 4).is_empty());
    }

    #[tokio::test]
    async fn test_generate_many_partitions_and_paces() {
        let provider = Arc::new(CountingImageProvider::default());
        let (generator, sleeper) = generator(provider.clone());

        let images = generator.generate_many("castle", 10).await.unwrap();

        assert_eq!(*provider.batches.lock().unwrap(), vec![4, 4, 2]);
        let tags: Vec<u8> = images.iter().map(|i| i.data[0]).collect();
        assert_eq!(tags, (0..10).collect::<Vec<u8>>());
        assert_eq!(sleeper.recorded(), vec![Duration::from_secs(1); 2]);
    }

    #[tokio::test]
    async fn test_single_batch_is_not_paced() {
        let provider = Arc::new(CountingImageProvider::default());
        let (generator, sleeper) = generator(provider.clone());

        assert_eq!(generator.generate_many("castle", 3).await.unwrap().len(), 3);
        assert!(sleeper.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_failed_batch_discards_partial_results() {
        let provider = Arc::new(CountingImageProvider {
            fail_on_batch: Some(2),
            ..Default::default()
        });
        let (generator, _) = generator(provider.clone());

        let result = generator.generate_many("castle", 10).await;
        assert!(matches!(result, Err(GenerationError::Provider(_))));
        assert_eq!(provider.batches.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_zero_count_is_rejected() {
        let provider = Arc::new(CountingImageProvider::default());
        let (generator, _) = generator(provider.clone());

        assert!(matches!(
            generator.generate_many("castle", 0).await,
            Err(GenerationError::InvalidRequest(_))
        ));
        assert!(provider.batches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_generate_one() {
        let provider = Arc::new(CountingImageProvider::default());
        let (generator, _) = generator(provider.clone());

        assert_eq!(generator.generate_one("cover").await.unwrap(), image(0));
        assert_eq!(*provider.batches.lock().unwrap(), vec![1]);
    }
}
