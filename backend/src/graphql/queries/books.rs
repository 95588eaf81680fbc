use super::prelude::*;

#[derive(Default)]
pub struct BookQueries;

/// Reject paging arguments outside the allowed window
fn check_page(limit: i32, offset: i32) -> Result<()> {
    let mut v = Violations::new();
    validation::page(&mut v, limit, offset);
    v.finish().map_err(|e| e.extend())
}

#[Object]
impl BookQueries {
    /// Get a single book by ID
    async fn book(&self, ctx: &Context<'_>, id: String) -> Result<BookResponse> {
        tracing::info!(book_id = %id, "Fetching book");

        let response = match ctx.clients().books.get_book(&id).await {
            Ok(Some(record)) => BookResponse {
                success: true,
                message: "Book retrieved successfully".to_string(),
                error_code: None,
                book: Some(Book(record)),
            },
            Ok(None) => BookResponse::failed(&GatewayError::NotFound("Book not found".to_string())),
            Err(e) => BookResponse::failed(&log_failure("book", e.into())),
        };
        Ok(response)
    }

    /// First page of the whole catalogue
    async fn books(&self, ctx: &Context<'_>) -> Result<BooksResponse> {
        let result =
            search_catalogue(ctx.clients(), "", SearchField::All, DEFAULT_LISTING_LIMIT, 0).await;
        Ok(match result {
            Ok(books) => BooksResponse::found(books),
            Err(e) => BooksResponse::failed(&log_failure("books", e)),
        })
    }

    /// Search by title, author, ISBN, genre or all of them
    async fn search_books(&self, ctx: &Context<'_>, input: BookSearchInput) -> Result<BooksResponse> {
        input.validate().map_err(|e| e.extend())?;
        tracing::info!(
            query = %input.query,
            search_type = ?input.search_type,
            limit = input.limit,
            offset = input.offset,
            "Searching books"
        );

        let result = search_catalogue(
            ctx.clients(),
            &input.query,
            input.search_type.into(),
            input.limit,
            input.offset,
        )
        .await;
        Ok(match result {
            Ok(books) => BooksResponse::found(books),
            Err(e) => BooksResponse::failed(&log_failure("searchBooks", e)),
        })
    }

    /// Books with at least one copy on the shelf
    async fn available_books(
        &self,
        ctx: &Context<'_>,
        #[graphql(default = 10)] limit: i32,
        #[graphql(default)] offset: i32,
    ) -> Result<BooksResponse> {
        check_page(limit, offset)?;

        Ok(match scan_catalogue(ctx.clients()).await {
            Ok(books) => {
                let available: Vec<_> = books.into_iter().filter(|b| b.is_available()).collect();
                BooksResponse::found(page_of(available, limit, offset))
            }
            Err(e) => BooksResponse::failed(&log_failure("availableBooks", e)),
        })
    }

    async fn books_by_genre(
        &self,
        ctx: &Context<'_>,
        genre: String,
        #[graphql(default = 10)] limit: i32,
        #[graphql(default)] offset: i32,
    ) -> Result<BooksResponse> {
        check_page(limit, offset)?;

        let result = search_catalogue(ctx.clients(), &genre, SearchField::Genre, limit, offset).await;
        Ok(match result {
            Ok(books) => BooksResponse::found(books),
            Err(e) => BooksResponse::failed(&log_failure("booksByGenre", e)),
        })
    }

    async fn books_by_author(
        &self,
        ctx: &Context<'_>,
        author: String,
        #[graphql(default = 10)] limit: i32,
        #[graphql(default)] offset: i32,
    ) -> Result<BooksResponse> {
        check_page(limit, offset)?;

        let result = search_catalogue(ctx.clients(), &author, SearchField::Author, limit, offset).await;
        Ok(match result {
            Ok(books) => BooksResponse::found(books),
            Err(e) => BooksResponse::failed(&log_failure("booksByAuthor", e)),
        })
    }

    /// Number of titles in the catalogue
    async fn total_books(&self, ctx: &Context<'_>) -> Result<i32> {
        let books = scan_catalogue(ctx.clients())
            .await
            .map_err(|e| log_failure("totalBooks", e).extend())?;
        Ok(books.len() as i32)
    }

    /// Number of titles with a copy on the shelf
    async fn total_available_books(&self, ctx: &Context<'_>) -> Result<i32> {
        let books = scan_catalogue(ctx.clients())
            .await
            .map_err(|e| log_failure("totalAvailableBooks", e).extend())?;
        Ok(books.iter().filter(|b| b.is_available()).count() as i32)
    }

    /// Distinct genres across the catalogue, sorted
    async fn book_genres(&self, ctx: &Context<'_>) -> Result<Vec<String>> {
        let books = scan_catalogue(ctx.clients())
            .await
            .map_err(|e| log_failure("bookGenres", e).extend())?;
        Ok(distinct_genres(&books))
    }
}
